/// Site registry for the CH₄ monitoring service.
///
/// Sites come from the `[[site]]` tables of the configuration file. When the
/// file defines none, the built-in registry below is used, so the service
/// works out of the box against the default field.

use serde::Deserialize;

use crate::model::GeoPoint;

// ---------------------------------------------------------------------------
// Site metadata
// ---------------------------------------------------------------------------

/// A monitored oil/gas site.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Site {
    /// Short stable identifier used on the command line and in logs.
    pub id: String,
    /// Display name used in reports.
    pub name: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl Site {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// An ad-hoc site from raw coordinates, e.g. `--lat/--lon` on the CLI.
    pub fn ad_hoc(name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            id: slug(name),
            name: name.to_string(),
            latitude,
            longitude,
            description: None,
        }
    }
}

struct BuiltinSite {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    latitude: f64,
    longitude: f64,
}

/// Built-in sites, used when the configuration defines none.
static BUILTIN_SITES: &[BuiltinSite] = &[
    BuiltinSite {
        id: "hassi-rmel",
        name: "Hassi R'mel",
        description: "Gas field and processing hub, Laghouat province. Default site.",
        latitude: 32.93,
        longitude: 3.30,
    },
    BuiltinSite {
        id: "hassi-messaoud",
        name: "Hassi Messaoud",
        description: "Oil field, Ouargla province.",
        latitude: 31.68,
        longitude: 6.07,
    },
    BuiltinSite {
        id: "in-amenas",
        name: "In Amenas",
        description: "Gas plant, Illizi province.",
        latitude: 27.88,
        longitude: 9.54,
    },
];

pub const DEFAULT_SITE_ID: &str = "hassi-rmel";

pub fn builtin_sites() -> Vec<Site> {
    BUILTIN_SITES
        .iter()
        .map(|b| Site {
            id: b.id.to_string(),
            name: b.name.to_string(),
            latitude: b.latitude,
            longitude: b.longitude,
            description: Some(b.description.to_string()),
        })
        .collect()
}

/// The configured sites, or the built-in registry if none are configured.
pub fn effective_sites(configured: &[Site]) -> Vec<Site> {
    if configured.is_empty() {
        builtin_sites()
    } else {
        configured.to_vec()
    }
}

/// Looks up a site by id (case-insensitive). Returns `None` if not found.
pub fn find_site<'a>(sites: &'a [Site], id: &str) -> Option<&'a Site> {
    sites.iter().find(|s| s.id.eq_ignore_ascii_case(id))
}

/// Lowercase ASCII slug: "Hassi R'mel" -> "hassi-r-mel".
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sites_have_valid_coordinates() {
        for site in builtin_sites() {
            assert!(
                site.location().is_valid(),
                "site '{}' has invalid coordinates {}",
                site.id,
                site.location()
            );
        }
    }

    #[test]
    fn test_no_duplicate_builtin_ids() {
        let mut seen = std::collections::HashSet::new();
        for site in builtin_sites() {
            assert!(seen.insert(site.id.clone()), "duplicate site id '{}'", site.id);
        }
    }

    #[test]
    fn test_default_site_is_hassi_rmel() {
        let sites = builtin_sites();
        let site = find_site(&sites, DEFAULT_SITE_ID).expect("default site should be built in");
        assert_eq!(site.name, "Hassi R'mel");
        assert_eq!(site.location(), GeoPoint::new(32.93, 3.30));
    }

    #[test]
    fn test_configured_sites_replace_builtins() {
        let configured = vec![Site::ad_hoc("Test Pad", 10.0, 20.0)];
        let sites = effective_sites(&configured);
        assert_eq!(sites.len(), 1);
        assert!(find_site(&sites, "hassi-rmel").is_none());
        assert!(find_site(&sites, "TEST-PAD").is_some());
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Hassi R'mel"), "hassi-r-mel");
        assert_eq!(slug("  Well #7 "), "well-7");
    }
}
