use crate::models::{ChartMetadata, ModMask};

/// Languages worker responses are written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    Fr,
    Es,
}

impl Locale {
    /// Unknown tags fall back to English; region suffixes are ignored
    pub fn from_tag(tag: &str) -> Self {
        let language = tag.split(['-', '_']).next().unwrap_or_default();
        match language.to_ascii_lowercase().as_str() {
            "fr" => Locale::Fr,
            "es" => Locale::Es,
            _ => Locale::En,
        }
    }
}

/// What a successful search tells the player
pub struct RecommendationText<'a> {
    pub chart: &'a ChartMetadata,
    pub mods: ModMask,
    pub pp: f64,
    /// Rating the player would gain by setting this score
    pub gain: f64,
    pub relaxed: bool,
}

pub fn recommendation(locale: Locale, text: &RecommendationText<'_>) -> String {
    let chart = text.chart;
    let stats = format!(
        "{:.2}★ | {} | {:.0} BPM | AR {:.1} OD {:.1} CS {:.1} HP {:.1}",
        chart.star_rating,
        chart.length_display(),
        chart.bpm,
        chart.approach_rate,
        chart.overall_difficulty,
        chart.circle_size,
        chart.drain,
    );

    let body = match locale {
        Locale::En => format!(
            "Try {} +{} ({}): {:.0}pp, worth +{:.1}pp to your total.",
            chart.display_name(),
            text.mods,
            stats,
            text.pp,
            text.gain
        ),
        Locale::Fr => format!(
            "Essaie {} +{} ({}) : {:.0}pp, soit +{:.1}pp sur ton total.",
            chart.display_name(),
            text.mods,
            stats,
            text.pp,
            text.gain
        ),
        Locale::Es => format!(
            "Prueba {} +{} ({}): {:.0}pp, +{:.1}pp para tu total.",
            chart.display_name(),
            text.mods,
            stats,
            text.pp,
            text.gain
        ),
    };

    if !text.relaxed {
        return body;
    }

    let note = match locale {
        Locale::En => "Nothing matched exactly, so the search was widened.",
        Locale::Fr => "Rien ne correspondait exactement, la recherche a été élargie.",
        Locale::Es => "Nada coincidía exactamente, así que se amplió la búsqueda.",
    };
    format!("{} {}", body, note)
}

pub fn not_found(locale: Locale) -> String {
    match locale {
        Locale::En => "Nothing matched your criteria. Try other modifiers or a different target.",
        Locale::Fr => "Aucune map ne correspond à tes critères. Essaie d'autres mods ou une autre cible.",
        Locale::Es => "Nada coincide con tus criterios. Prueba otros mods u otro objetivo.",
    }
    .to_string()
}

pub fn internal_error(locale: Locale) -> String {
    match locale {
        Locale::En => "Something went wrong while looking for a map. Please try again later.",
        Locale::Fr => "Une erreur est survenue pendant la recherche. Réessaie plus tard.",
        Locale::Es => "Algo salió mal al buscar un mapa. Inténtalo de nuevo más tarde.",
    }
    .to_string()
}
