use serde::{Deserialize, Serialize};

/// Display metadata of a chart, hydrated once for the winning candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartMetadata {
    pub beatmap_id: u32,
    pub title: String,
    pub artist: String,
    /// Difficulty name
    pub version: String,
    pub creator: String,
    pub star_rating: f64,
    pub length_secs: u32,
    pub bpm: f64,
    pub approach_rate: f64,
    pub overall_difficulty: f64,
    pub circle_size: f64,
    pub drain: f64,
}

impl ChartMetadata {
    /// `Artist - Title [Version]`
    pub fn display_name(&self) -> String {
        format!("{} - {} [{}]", self.artist, self.title, self.version)
    }

    /// Chart length formatted as `m:ss`
    pub fn length_display(&self) -> String {
        format!("{}:{:02}", self.length_secs / 60, self.length_secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_helpers() {
        let chart = ChartMetadata {
            beatmap_id: 129891,
            title: "FREEDOM DiVE".to_string(),
            artist: "xi".to_string(),
            version: "FOUR DIMENSIONS".to_string(),
            creator: "Nakagawa-Kanon".to_string(),
            star_rating: 7.07,
            length_secs: 257,
            bpm: 222.22,
            approach_rate: 9.0,
            overall_difficulty: 8.0,
            circle_size: 4.0,
            drain: 6.0,
        };
        assert_eq!(chart.display_name(), "xi - FREEDOM DiVE [FOUR DIMENSIONS]");
        assert_eq!(chart.length_display(), "4:17");
    }
}
