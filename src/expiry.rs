//! Probe expiry notifications
//!
//! A probe declaring `expires_in_version` is reported exactly when the
//! release that version ships in is `lead` days away. Versions are mapped to
//! dates through a release calendar whose keys are nightly version names
//! (`41.0a1`), so `41` and `41.0` are normalised to that form first.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::notify::Message;
use crate::probes::{ProbeCatalog, ProbeDefinition};
use crate::store::NotifiedNames;
use crate::versions::version_normalize_nightly;

/// Subject line of expiry digests
pub const EXPIRY_SUBJECT: &str = "Telemetry Histogram Expiry";

/// Planned date of each upcoming version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseCalendar(BTreeMap<String, NaiveDate>);

impl ReleaseCalendar {
    /// Load a JSON object of `version -> YYYY-MM-DD`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read release calendar: {}", path.as_ref().display())
        })?;
        serde_json::from_str(&content).context("Failed to parse release calendar")
    }

    pub fn insert(&mut self, version: impl Into<String>, date: NaiveDate) {
        self.0.insert(version.into(), date);
    }

    pub fn release_date(&self, version: &str) -> Option<NaiveDate> {
        self.0.get(version).copied()
    }
}

impl FromIterator<(String, NaiveDate)> for ReleaseCalendar {
    fn from_iter<I: IntoIterator<Item = (String, NaiveDate)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// True when `probe` expires in the release exactly `lead` after `today`
pub fn is_expiring(
    probe: &ProbeDefinition,
    today: NaiveDate,
    calendar: &ReleaseCalendar,
    lead: Duration,
) -> bool {
    let version = probe
        .expires_in_version
        .as_deref()
        .unwrap_or("never")
        .trim();
    if version == "never" || version == "default" {
        return false;
    }

    let nightly = match version_normalize_nightly(version) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Unparseable expiry version {:?}: {}", version, e);
            return false;
        }
    };

    calendar
        .release_date(&nightly)
        .is_some_and(|release| today.checked_add_signed(lead) == Some(release))
}

/// Expiring probes in name order
pub fn expiring_probes<'a>(
    catalog: &'a ProbeCatalog,
    today: NaiveDate,
    calendar: &ReleaseCalendar,
    lead: Duration,
) -> Vec<(&'a str, &'a ProbeDefinition)> {
    catalog
        .iter()
        .filter(|(_, probe)| is_expiring(probe, today, calendar, lead))
        .collect()
}

/// One line per expiring probe, listing watchers when there are any
pub fn listing(expiring: &[(&str, &ProbeDefinition)]) -> Vec<String> {
    expiring
        .iter()
        .map(|(name, probe)| {
            let mut line = format!(
                "{} expires in version {}",
                name,
                probe.expires_in_version.as_deref().unwrap_or_default()
            );
            if !probe.alert_emails.is_empty() {
                let _ = write!(line, " (watched by {})", probe.alert_emails.join(", "));
            }
            line
        })
        .collect()
}

/// One digest per subscriber of a not-yet-notified expiring probe
///
/// Every digest lists all expiring probes, marking the recipient's own
/// subscriptions with `[SUBSCRIBED]`.
pub fn subscriber_digests(
    expiring: &[(&str, &ProbeDefinition)],
    today: NaiveDate,
    lead: Duration,
    notified: &NotifiedNames,
    from_addr: &str,
) -> Vec<Message> {
    let mut by_subscriber: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (name, probe) in expiring {
        if notified.contains(name) {
            continue;
        }
        for email in &probe.alert_emails {
            by_subscriber.entry(email.as_str()).or_default().insert(*name);
        }
    }

    let deadline = today.checked_add_signed(lead).unwrap_or(today);

    by_subscriber
        .into_iter()
        .map(|(email, subscribed)| {
            let mut body = format!(
                "The following histograms will be expired on or before {}, \
                 and should be removed from the codebase:\n\n",
                deadline
            );
            for (name, probe) in expiring {
                let _ = writeln!(
                    body,
                    "* {} expires in version {}{}",
                    name,
                    probe.expires_in_version.as_deref().unwrap_or_default(),
                    if subscribed.contains(name) {
                        " [SUBSCRIBED]"
                    } else {
                        ""
                    }
                );
            }
            body.push_str("\nThis is an automated message sent by Cerberus.\n");

            Message {
                id: format!("expiry-{}-{}", deadline, email),
                from: from_addr.to_string(),
                to: email.to_string(),
                subject: EXPIRY_SUBJECT.to_string(),
                body,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn probe(version: &str, emails: &[&str]) -> ProbeDefinition {
        ProbeDefinition {
            description: None,
            alert_emails: emails.iter().map(|e| e.to_string()).collect(),
            expires_in_version: Some(version.to_string()),
        }
    }

    fn catalog() -> ProbeCatalog {
        let mut catalog = ProbeCatalog::default();
        catalog.insert("a", probe("40", &["x@example.com"]));
        catalog.insert("b", probe("40", &["x@example.com", "y@example.com"]));
        catalog.insert("c", probe("40.5", &[]));
        catalog.insert("d", probe("50", &[]));
        catalog.insert("e", probe("50", &[]));
        catalog.insert("f", probe("42", &[]));
        catalog.insert("g", probe("45", &[]));
        catalog.insert("h", probe("50a4", &[]));
        catalog.insert("never", probe("never", &["x@example.com"]));
        catalog
    }

    fn long_calendar() -> ReleaseCalendar {
        [
            ("38.0a1", date(2015, 6, 2)),
            ("39.0a1", date(2015, 6, 30)),
            ("40.0a1", date(2015, 8, 11)),
            ("41.0a1", date(2015, 9, 22)),
            ("42.0a1", date(2015, 11, 3)),
            ("43.0a1", date(2015, 12, 15)),
            ("44.0a1", date(2016, 1, 26)),
            ("45.0a1", date(2016, 3, 8)),
            ("46.0a1", date(2016, 4, 19)),
            ("47.0a1", date(2016, 5, 31)),
        ]
        .into_iter()
        .map(|(v, d)| (v.to_string(), d))
        .collect()
    }

    fn short_calendar() -> ReleaseCalendar {
        [
            ("41.0a1", date(2015, 9, 22)),
            ("42.0a1", date(2015, 11, 3)),
            ("43.0a1", date(2015, 12, 15)),
        ]
        .into_iter()
        .map(|(v, d)| (v.to_string(), d))
        .collect()
    }

    fn names(today: NaiveDate, calendar: &ReleaseCalendar) -> Vec<String> {
        let catalog = catalog();
        expiring_probes(&catalog, today, calendar, Duration::weeks(1))
            .into_iter()
            .map(|(n, _)| n.to_string())
            .collect()
    }

    #[test]
    fn test_expiring_exactly_one_week_ahead() {
        let long = long_calendar();
        assert!(names(date(2015, 8, 3), &long).is_empty());
        assert_eq!(names(date(2015, 8, 4), &long), vec!["a", "b"]);
        assert!(names(date(2015, 8, 5), &long).is_empty());

        let short = short_calendar();
        assert!(names(date(2015, 9, 1), &short).is_empty());
        assert!(names(date(2015, 10, 26), &short).is_empty());
        assert_eq!(names(date(2015, 10, 27), &short), vec!["f"]);
        assert!(names(date(2015, 10, 28), &short).is_empty());
    }

    #[test]
    fn test_never_and_default_do_not_expire() {
        let calendar = long_calendar();
        let lead = Duration::weeks(1);
        assert!(!is_expiring(&probe("never", &[]), date(2015, 8, 4), &calendar, lead));
        assert!(!is_expiring(&probe("default", &[]), date(2015, 8, 4), &calendar, lead));
        assert!(!is_expiring(&ProbeDefinition::default(), date(2015, 8, 4), &calendar, lead));
    }

    #[test]
    fn test_listing_shows_watchers() {
        let catalog = catalog();
        let expiring =
            expiring_probes(&catalog, date(2015, 8, 4), &long_calendar(), Duration::weeks(1));
        let lines = listing(&expiring);
        assert_eq!(
            lines,
            vec![
                "a expires in version 40 (watched by x@example.com)",
                "b expires in version 40 (watched by x@example.com, y@example.com)",
            ]
        );
    }

    #[test]
    fn test_digests_per_subscriber() {
        let catalog = catalog();
        let lead = Duration::weeks(1);
        let today = date(2015, 8, 4);
        let expiring = expiring_probes(&catalog, today, &long_calendar(), lead);

        let digests =
            subscriber_digests(&expiring, today, lead, &NotifiedNames::default(), "from@example.com");

        assert_eq!(digests.len(), 2);
        let x = &digests[0];
        assert_eq!(x.to, "x@example.com");
        assert_eq!(x.subject, EXPIRY_SUBJECT);
        assert!(x.body.contains("on or before 2015-08-11"));
        assert!(x.body.contains("* a expires in version 40 [SUBSCRIBED]"));
        assert!(x.body.contains("* b expires in version 40 [SUBSCRIBED]"));

        let y = &digests[1];
        assert!(y.body.contains("* a expires in version 40\n"));
        assert!(y.body.contains("* b expires in version 40 [SUBSCRIBED]"));
    }

    #[test]
    fn test_digests_skip_already_notified() {
        let catalog = catalog();
        let lead = Duration::weeks(1);
        let today = date(2015, 8, 4);
        let expiring = expiring_probes(&catalog, today, &long_calendar(), lead);

        let mut notified = NotifiedNames::default();
        notified.insert("b");

        let digests = subscriber_digests(&expiring, today, lead, &notified, "from@example.com");
        assert_eq!(digests.len(), 1);
        assert_eq!(digests[0].to, "x@example.com");
    }
}
