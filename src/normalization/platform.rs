//! Static maps from external provider vocabularies to the internal platform
//! taxonomy.
//!
//! This is the only place provider identifiers are translated; the pipelines
//! never create platforms. Unknown identifiers are dropped by the caller (and
//! surfaced as a count), which keeps long-tail services from leaking into the
//! platforms table. Operators extend these tables by hand.

/// TMDB watch-provider numeric ids to platform slugs.
/// Reference dump: /watch/providers/movie?watch_region=FR
const TMDB_PROVIDER_MAP: &[(u32, &str)] = &[
    // Subscription services
    (8, "netflix"),
    (1796, "netflix"), // Netflix with Ads
    (119, "amazon-prime-video"),
    (10, "amazon-prime-video"),   // Amazon Video (rental/purchase)
    (2100, "amazon-prime-video"), // Amazon Prime with Ads
    (337, "disney"),
    (234, "arte"),
    (190, "curiosity-stream"),
    (531, "paramount"),
    (2303, "paramount"), // Paramount Plus Premium
    (11, "mubi"),
    (201, "mubi"), // MUBI Amazon Channel
    (350, "apple-tv"),
    (2, "apple-tv"),
    // Free platforms
    (192, "youtube"),
    (188, "youtube"), // YouTube Premium
    (538, "plex"),
    (2077, "plex"), // Plex Channel
];

/// JustWatch package technical names (and fragments thereof) to platform
/// slugs. Matched by containment because package names vary per country.
const JUSTWATCH_PACKAGE_MAP: &[(&str, &str)] = &[
    ("nfx", "netflix"),
    ("netflix", "netflix"),
    ("amp", "amazon-prime-video"),
    ("prv", "amazon-prime-video"),
    ("amazon", "amazon-prime-video"),
    ("dnp", "disney"),
    ("disney", "disney"),
    ("atp", "apple-tv"),
    ("apple", "apple-tv"),
    ("itu", "apple-tv"),
    ("arte", "arte"),
    ("mbi", "mubi"),
    ("mubi", "mubi"),
    ("pmp", "paramount"),
    ("paramount", "paramount"),
    ("cts", "curiosity-stream"),
    ("curiosity", "curiosity-stream"),
    ("yot", "youtube"),
    ("youtube", "youtube"),
    ("vim", "vimeo"),
    ("vimeo", "vimeo"),
    ("plex", "plex"),
    ("redbulltv", "red-bull-tv"),
];

pub fn tmdb_provider_slug(provider_id: u32) -> Option<&'static str> {
    TMDB_PROVIDER_MAP
        .iter()
        .find(|(id, _)| *id == provider_id)
        .map(|(_, slug)| *slug)
}

pub fn justwatch_package_slug(technical_name: &str) -> Option<&'static str> {
    let name = technical_name.to_ascii_lowercase();
    JUSTWATCH_PACKAGE_MAP
        .iter()
        .find(|(key, _)| name.contains(key))
        .map(|(_, slug)| *slug)
}

/// Free and ad-supported offerings count as free; subscription and rental
/// categories do not.
pub fn monetization_is_free(monetization: &str) -> bool {
    matches!(
        monetization.to_ascii_uppercase().as_str(),
        "FREE" | "ADS" | "AD_SUPPORTED"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_tmdb_provider_ids() {
        assert_eq!(tmdb_provider_slug(8), Some("netflix"));
        assert_eq!(tmdb_provider_slug(1796), Some("netflix"));
        assert_eq!(tmdb_provider_slug(234), Some("arte"));
    }

    #[test]
    fn unknown_tmdb_provider_ids_are_dropped() {
        assert_eq!(tmdb_provider_slug(999_999), None);
    }

    #[test]
    fn justwatch_packages_match_by_fragment() {
        assert_eq!(justwatch_package_slug("nfx"), Some("netflix"));
        assert_eq!(justwatch_package_slug("amazonprimevideo"), Some("amazon-prime-video"));
        assert_eq!(justwatch_package_slug("obscure-service"), None);
    }

    #[test]
    fn subscription_is_not_free() {
        assert!(monetization_is_free("FREE"));
        assert!(monetization_is_free("ads"));
        assert!(!monetization_is_free("FLATRATE"));
        assert!(!monetization_is_free("RENT"));
    }
}
