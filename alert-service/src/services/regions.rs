//! Geographic region and country derivation from location names.
//!
//! Rules can match on `region` and `country`, but events frequently arrive
//! with only a human-readable `location_name` ("Kharkiv, Ukraine"). This
//! module turns that string into the fixed region taxonomy and a normalized
//! country name.

use once_cell::sync::Lazy;

/// Region keyword tables. Keywords cover countries, demonyms, capitals and
/// a few recurring hotspot terms; matching is case-insensitive containment.
const REGION_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "MIDDLE_EAST",
        &[
            "israel", "israeli", "palestine", "palestinian", "gaza", "west bank", "lebanon",
            "lebanese", "syria", "syrian", "iran", "iranian", "iraq", "iraqi", "yemen", "yemeni",
            "saudi arabia", "saudi", "uae", "united arab emirates", "qatar", "jordan", "kuwait",
            "bahrain", "oman", "tel aviv", "jerusalem", "beirut", "damascus", "tehran", "baghdad",
            "riyadh", "sanaa", "houthi", "hezbollah", "hamas", "red sea",
        ],
    ),
    (
        "EAST_ASIA",
        &[
            "china", "chinese", "taiwan", "taiwanese", "japan", "japanese", "south korea",
            "north korea", "korean", "dprk", "hong kong", "mongolia", "beijing", "shanghai",
            "taipei", "tokyo", "seoul", "pyongyang", "taiwan strait", "south china sea",
            "east china sea",
        ],
    ),
    (
        "SOUTHEAST_ASIA",
        &[
            "vietnam", "vietnamese", "philippines", "philippine", "filipino", "indonesia",
            "indonesian", "malaysia", "malaysian", "thailand", "thai", "myanmar", "burma",
            "singapore", "cambodia", "laos", "manila", "jakarta", "bangkok", "hanoi",
        ],
    ),
    (
        "SOUTH_ASIA",
        &[
            "india", "indian", "pakistan", "pakistani", "bangladesh", "bangladeshi", "sri lanka",
            "nepal", "afghanistan", "afghan", "kashmir", "new delhi", "islamabad", "kabul",
            "dhaka", "colombo",
        ],
    ),
    (
        "EUROPE",
        &[
            "ukraine", "ukrainian", "russia", "russian", "poland", "polish", "germany", "german",
            "france", "french", "united kingdom", "britain", "british", "england", "italy",
            "spain", "netherlands", "belgium", "sweden", "finland", "norway", "estonia", "latvia",
            "lithuania", "romania", "hungary", "czech", "serbia", "kosovo", "belarus", "moldova",
            "georgia", "armenia", "azerbaijan", "turkey", "turkish", "greece", "kyiv", "kharkiv",
            "odesa", "moscow", "london", "paris", "berlin", "brussels", "warsaw", "ankara",
            "istanbul", "crimea", "black sea", "baltic", "nato",
        ],
    ),
    (
        "AFRICA",
        &[
            "egypt", "egyptian", "libya", "libyan", "sudan", "sudanese", "ethiopia", "ethiopian",
            "somalia", "somali", "kenya", "kenyan", "nigeria", "nigerian", "mali", "niger",
            "burkina faso", "chad", "congo", "drc", "rwanda", "south africa", "algeria", "morocco",
            "tunisia", "cairo", "tripoli", "khartoum", "addis ababa", "mogadishu", "lagos",
            "sahel",
        ],
    ),
    (
        "AMERICAS",
        &[
            "united states", "american", "usa", "u.s.", "canada", "canadian", "mexico", "mexican",
            "brazil", "brazilian", "argentina", "venezuela", "venezuelan", "colombia", "colombian",
            "cuba", "cuban", "haiti", "haitian", "chile", "peru", "bolivia", "ecuador", "panama",
            "washington", "new york", "ottawa", "mexico city", "brasilia", "caracas", "bogota",
            "havana",
        ],
    ),
    (
        "CENTRAL_ASIA",
        &[
            "kazakhstan", "kazakh", "uzbekistan", "uzbek", "kyrgyzstan", "kyrgyz", "tajikistan",
            "tajik", "turkmenistan", "turkmen", "astana", "tashkent", "bishkek", "dushanbe",
        ],
    ),
    (
        "OCEANIA",
        &[
            "australia", "australian", "new zealand", "papua new guinea", "fiji", "solomon islands",
            "canberra", "sydney", "wellington", "auckland", "pacific islands",
        ],
    ),
];

/// Fallback region for unrecognized locations.
pub const REGION_OTHER: &str = "OTHER";

/// Keyword index sorted longest-first so "south korea" wins over "korea"
/// and "united kingdom" over "united".
static KEYWORD_INDEX: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    let mut index: Vec<(&'static str, &'static str)> = REGION_KEYWORDS
        .iter()
        .flat_map(|(region, keywords)| keywords.iter().map(move |kw| (*kw, *region)))
        .collect();
    index.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
    index
});

/// Country aliases, keyed by the lowercase trailing segment of a location
/// name. Rules are authored against the short forms.
const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("gaza strip", "Gaza"),
    ("united states", "USA"),
    ("united states of america", "USA"),
    ("us", "USA"),
    ("u.s.", "USA"),
    ("united kingdom", "UK"),
    ("great britain", "UK"),
    ("united arab emirates", "UAE"),
    ("russian federation", "Russia"),
    ("republic of korea", "South Korea"),
    ("democratic republic of the congo", "DRC"),
];

/// Extracts the geographic region for a location name.
///
/// Returns a region code from the fixed taxonomy, or [`REGION_OTHER`] when
/// nothing matches.
pub fn infer_region(location_name: &str) -> &'static str {
    if location_name.is_empty() {
        return REGION_OTHER;
    }

    let haystack = location_name.to_lowercase();
    for (keyword, region) in KEYWORD_INDEX.iter() {
        if haystack.contains(keyword) {
            return region;
        }
    }

    REGION_OTHER
}

/// Derives a country from a location name by taking the trailing
/// comma-separated segment and normalizing known aliases.
///
/// "Rafah, Gaza Strip" yields "Gaza"; "Austin, Texas, United States" yields
/// "USA"; an unrecognized trailing segment is returned trimmed as-is.
pub fn derive_country(location_name: &str) -> String {
    let tail = location_name
        .rsplit(',')
        .next()
        .map(str::trim)
        .unwrap_or_default();

    if tail.is_empty() {
        return String::new();
    }

    let tail_lower = tail.to_lowercase();
    for (alias, canonical) in COUNTRY_ALIASES {
        if tail_lower == *alias {
            return (*canonical).to_string();
        }
    }

    tail.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_region_by_country() {
        assert_eq!(infer_region("Kyiv, Ukraine"), "EUROPE");
        assert_eq!(infer_region("Taipei, Taiwan"), "EAST_ASIA");
        assert_eq!(infer_region("Khartoum, Sudan"), "AFRICA");
        assert_eq!(infer_region("Caracas, Venezuela"), "AMERICAS");
    }

    #[test]
    fn test_infer_region_by_city_only() {
        assert_eq!(infer_region("Beirut"), "MIDDLE_EAST");
        assert_eq!(infer_region("Bangkok"), "SOUTHEAST_ASIA");
    }

    #[test]
    fn test_infer_region_longest_keyword_wins() {
        // "south korea" must not fall through to a shorter match
        assert_eq!(infer_region("Busan, South Korea"), "EAST_ASIA");
        assert_eq!(infer_region("South China Sea"), "EAST_ASIA");
    }

    #[test]
    fn test_infer_region_unknown() {
        assert_eq!(infer_region(""), REGION_OTHER);
        assert_eq!(infer_region("Atlantis"), REGION_OTHER);
    }

    #[test]
    fn test_derive_country_trailing_segment() {
        assert_eq!(derive_country("Kyiv, Ukraine"), "Ukraine");
        assert_eq!(derive_country("Austin, Texas, United States"), "USA");
    }

    #[test]
    fn test_derive_country_aliases() {
        assert_eq!(derive_country("Rafah, Gaza Strip"), "Gaza");
        assert_eq!(derive_country("London, United Kingdom"), "UK");
        assert_eq!(derive_country("Dubai, United Arab Emirates"), "UAE");
    }

    #[test]
    fn test_derive_country_no_comma() {
        assert_eq!(derive_country("France"), "France");
        assert_eq!(derive_country(""), "");
    }
}
