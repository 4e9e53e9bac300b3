//! Record expiry
//!
//! A record either never expires, expires at a fixed instant, or expires a
//! fixed span after its last update. The relative form moves forward every
//! time the record is written again.

use chrono::{DateTime, Duration, Utc};

/// When a record stops being valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// Valid until deleted
    #[default]
    Never,
    /// Invalid after this instant
    At(DateTime<Utc>),
    /// Invalid this long after the last update
    AfterUpdate(Duration),
}

impl Expiry {
    /// Resolve to an instant, given the record's last update time
    pub fn deadline(&self, updated: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        match self {
            Expiry::Never => None,
            Expiry::At(at) => Some(*at),
            Expiry::AfterUpdate(ttl) => updated.map(|u| u + *ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadlines() {
        let now = Utc::now();
        assert_eq!(Expiry::Never.deadline(Some(now)), None);
        assert_eq!(Expiry::At(now).deadline(None), Some(now));
        assert_eq!(
            Expiry::AfterUpdate(Duration::seconds(30)).deadline(Some(now)),
            Some(now + Duration::seconds(30))
        );
        assert_eq!(Expiry::AfterUpdate(Duration::seconds(30)).deadline(None), None);
    }
}
