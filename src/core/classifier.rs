//! Trade classification
//!
//! Decides, per event and without I/O, whether a trade is too old, filtered
//! by sub-kind, a fast-cycle trade (fresh or stale), or a candidate for the
//! ledger. Rules are evaluated in that order; the first match wins.
//!
//! Drop decisions that would otherwise repeat every poll are logged once,
//! through process-local suppression sets.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::info;

use crate::adapters::TradeEvent;
use crate::config::FilterConfig;
use crate::core::logging::ShortAddress;
use crate::core::registry::{AccountCategory, AccountRecord};

const SECS_PER_HOUR: i64 = 3600;
const MINUTES_PER_DAY: u32 = 24 * 60;

/// Micro-interval "Up or Down" markets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubKind {
    UpDown15m,
    UpDown5m,
}

impl SubKind {
    fn slug_marker(&self) -> &'static str {
        match self {
            SubKind::UpDown15m => "-updown-15m-",
            SubKind::UpDown5m => "-updown-5m-",
        }
    }

    fn interval_minutes(&self) -> u32 {
        match self {
            SubKind::UpDown15m => 15,
            SubKind::UpDown5m => 5,
        }
    }
}

impl std::fmt::Display for SubKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubKind::UpDown15m => write!(f, "15m up/down"),
            SubKind::UpDown5m => write!(f, "5m up/down"),
        }
    }
}

/// Which sub-kinds are allowed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterFlags {
    pub enable_15m_updown: bool,
    pub enable_5m_updown: bool,
}

impl FilterFlags {
    pub fn allows(&self, kind: SubKind) -> bool {
        match kind {
            SubKind::UpDown15m => self.enable_15m_updown,
            SubKind::UpDown5m => self.enable_5m_updown,
        }
    }
}

impl From<&FilterConfig> for FilterFlags {
    fn from(config: &FilterConfig) -> Self {
        Self {
            enable_15m_updown: config.enable_15m_updown,
            enable_5m_updown: config.enable_5m_updown,
        }
    }
}

/// Outcome of classifying one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Missing hash or older than the stale window
    TooOld,
    /// Sub-kind disabled by its flag
    Filtered(SubKind),
    /// Fast-cycle account, age at or past the threshold
    FastCycleStale { age_secs: i64 },
    /// Fast-cycle account, within the threshold: stream, never persist
    FastCycleFresh { age_secs: i64 },
    /// Standard account: dedup against the ledger and persist
    Candidate,
}

// ============================================================================
// Pure rules
// ============================================================================

/// `now - hours*3600`, saturating instead of overflowing on huge windows
pub fn window_start(now: i64, hours: u64) -> i64 {
    let secs = i64::try_from(hours)
        .unwrap_or(i64::MAX)
        .saturating_mul(SECS_PER_HOUR);
    now.saturating_sub(secs)
}

/// Missing hash, or `timestamp < now - hours*3600`
pub fn is_too_old(event: &TradeEvent, now: i64, stale_window_hours: u64) -> bool {
    !event.has_hash() || event.timestamp < window_start(now, stale_window_hours)
}

/// Stale when `age >= threshold`: exactly the threshold is already stale
pub fn is_stale_fast_cycle(age_secs: i64, staleness_threshold_secs: u64) -> bool {
    age_secs >= i64::try_from(staleness_threshold_secs).unwrap_or(i64::MAX)
}

/// Coarse identity for a logical trade: the same position change can surface
/// under several transaction hashes within the hour.
pub fn logical_trade_key(account: &str, event: &TradeEvent) -> String {
    format!(
        "{}|{}|{}|{}",
        account,
        event.condition_id,
        event.kind,
        event.timestamp.div_euclid(SECS_PER_HOUR)
    )
}

/// Detect a micro-interval market from the slug, then from a title time range
pub fn detect_sub_kind(event: &TradeEvent) -> Option<SubKind> {
    const KINDS: [SubKind; 2] = [SubKind::UpDown15m, SubKind::UpDown5m];

    for kind in KINDS {
        let marker = kind.slug_marker();
        if event.slug.contains(marker) || event.event_slug.contains(marker) {
            return Some(kind);
        }
    }

    if !event.title.to_lowercase().contains("up or down") {
        return None;
    }
    let span = title_range_minutes(&event.title)?;
    KINDS.into_iter().find(|k| k.interval_minutes() == span)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

/// Span in minutes of the first `H:MM[AM|PM]-H:MM[AM|PM]` range in `title`
fn title_range_minutes(title: &str) -> Option<u32> {
    let bytes = title.as_bytes();

    for start in 0..bytes.len() {
        if !bytes[start].is_ascii_digit() || (start > 0 && bytes[start - 1].is_ascii_digit()) {
            continue;
        }
        let Some((h1, m1, mer1, mut i)) = parse_clock(bytes, start) else {
            continue;
        };

        i = skip_spaces(bytes, i);
        i = match bytes.get(i) {
            Some(b'-') => i + 1,
            // en dash
            Some(0xE2) if bytes.get(i + 1..i + 3) == Some(&[0x80u8, 0x93][..]) => i + 3,
            _ => continue,
        };
        i = skip_spaces(bytes, i);

        let Some((h2, m2, mer2, _)) = parse_clock(bytes, i) else {
            continue;
        };

        // "3:15-3:30PM" carries the meridiem only on the end time
        let from = to_minutes(h1, m1, mer1.or(mer2));
        let to = to_minutes(h2, m2, mer2);
        return Some((to + MINUTES_PER_DAY - from) % MINUTES_PER_DAY);
    }
    None
}

/// `H:MM` or `HH:MM` with an optional AM/PM suffix
fn parse_clock(bytes: &[u8], start: usize) -> Option<(u32, u32, Option<Meridiem>, usize)> {
    let mut i = start;
    let mut hour = 0u32;
    while i < bytes.len() && bytes[i].is_ascii_digit() && i - start < 2 {
        hour = hour * 10 + u32::from(bytes[i] - b'0');
        i += 1;
    }
    if i == start || bytes.get(i) != Some(&b':') {
        return None;
    }
    i += 1;

    let digits = bytes.get(i..i + 2)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let minute = u32::from(digits[0] - b'0') * 10 + u32::from(digits[1] - b'0');
    i += 2;
    if minute >= 60 || bytes.get(i).is_some_and(u8::is_ascii_digit) {
        return None;
    }

    let j = skip_spaces(bytes, i);
    let meridiem = match bytes.get(j..j + 2).map(|s| s.to_ascii_lowercase()) {
        Some(s) if s == b"am" => Some(Meridiem::Am),
        Some(s) if s == b"pm" => Some(Meridiem::Pm),
        _ => None,
    };
    if meridiem.is_some() {
        i = j + 2;
    }

    let valid_hour = match meridiem {
        Some(_) => (1..=12).contains(&hour),
        None => hour < 24,
    };
    valid_hour.then_some((hour, minute, meridiem, i))
}

fn to_minutes(hour: u32, minute: u32, meridiem: Option<Meridiem>) -> u32 {
    let hour = match meridiem {
        Some(Meridiem::Am) => hour % 12,
        Some(Meridiem::Pm) => hour % 12 + 12,
        None => hour,
    };
    hour * 60 + minute
}

fn skip_spaces(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i) == Some(&b' ') {
        i += 1;
    }
    i
}

// ============================================================================
// Log suppression
// ============================================================================

/// Remembers keys already logged. Never evicts.
#[derive(Debug, Default)]
pub struct Suppressor {
    seen: Mutex<HashSet<String>>,
}

impl Suppressor {
    /// True the first time `key` is seen
    pub fn first_time(&self, key: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.contains(key) {
            false
        } else {
            seen.insert(key.to_string())
        }
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Classifier
// ============================================================================

#[derive(Debug)]
pub struct Classifier {
    flags: FilterFlags,
    stale_window_hours: u64,
    filtered_log: Suppressor,
    stale_log: Suppressor,
}

impl Classifier {
    pub fn new(flags: FilterFlags, stale_window_hours: u64) -> Self {
        Self {
            flags,
            stale_window_hours,
            filtered_log: Suppressor::default(),
            stale_log: Suppressor::default(),
        }
    }

    pub fn stale_window_hours(&self) -> u64 {
        self.stale_window_hours
    }

    pub fn classify(&self, account: &AccountRecord, event: &TradeEvent, now: i64) -> Verdict {
        if is_too_old(event, now, self.stale_window_hours) {
            return Verdict::TooOld;
        }

        if let Some(kind) = detect_sub_kind(event) {
            if !self.flags.allows(kind) {
                let key = format!("{:?}|{}", kind, event.transaction_hash);
                if self.filtered_log.first_time(&key) {
                    info!(
                        account = %ShortAddress(&account.address),
                        tx = %event.transaction_hash,
                        title = %event.title,
                        "[FILTER] Skipping {} trade",
                        kind
                    );
                }
                return Verdict::Filtered(kind);
            }
        }

        match account.category {
            AccountCategory::FastCycle {
                staleness_threshold_secs,
            } => {
                let age_secs = event.age_secs(now);
                if is_stale_fast_cycle(age_secs, staleness_threshold_secs) {
                    if self.stale_log.first_time(&logical_trade_key(&account.address, event)) {
                        info!(
                            account = %ShortAddress(&account.address),
                            condition_id = %event.condition_id,
                            age_secs,
                            threshold_secs = staleness_threshold_secs,
                            "[FAST] Ignoring stale fast-cycle trade"
                        );
                    }
                    Verdict::FastCycleStale { age_secs }
                } else {
                    Verdict::FastCycleFresh { age_secs }
                }
            }
            AccountCategory::Standard => Verdict::Candidate,
        }
    }

    /// Number of distinct keys currently suppressing log lines
    pub fn suppressed_keys(&self) -> usize {
        self.filtered_log.len() + self.stale_log.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;
    const ACCOUNT: &str = "0x6a72f61820b26b1fe4d956e17b6dc2a1ea3033ee";

    fn event(hash: &str, timestamp: i64) -> TradeEvent {
        TradeEvent {
            transaction_hash: hash.to_string(),
            timestamp,
            condition_id: "0xcond".to_string(),
            kind: "TRADE".to_string(),
            ..Default::default()
        }
    }

    fn titled(title: &str) -> TradeEvent {
        TradeEvent {
            title: title.to_string(),
            ..event("0x1", NOW)
        }
    }

    #[test]
    fn test_too_old_boundaries() {
        let window = 24 * 3600;
        assert!(!is_too_old(&event("0x1", NOW - window), NOW, 24));
        assert!(is_too_old(&event("0x1", NOW - window - 1), NOW, 24));
        assert!(is_too_old(&event("", NOW), NOW, 24));
        // Malformed timestamps parse to 0
        assert!(is_too_old(&event("0x1", 0), NOW, 24));
    }

    #[test]
    fn test_fast_cycle_boundary_is_exclusive() {
        assert!(is_stale_fast_cycle(900, 900));
        assert!(!is_stale_fast_cycle(899, 900));
        assert!(is_stale_fast_cycle(901, 900));
    }

    #[test]
    fn test_huge_windows_saturate() {
        assert_eq!(window_start(NOW, 24), NOW - 24 * 3600);
        assert_eq!(window_start(NOW, 3_000_000_000_000_000), i64::MIN);
        assert_eq!(window_start(NOW, u64::MAX), i64::MIN);
        assert!(!is_too_old(&event("0x1", NOW - 3600), NOW, u64::MAX));

        // A threshold beyond i64 never wraps to negative
        assert!(!is_stale_fast_cycle(i64::MAX - 1, u64::MAX));

        let classifier = Classifier::new(FilterFlags::default(), 3_000_000_000_000_000);
        let record = AccountRecord::standard(ACCOUNT);
        assert_eq!(
            classifier.classify(&record, &event("0x1", NOW - 7200), NOW),
            Verdict::Candidate
        );
    }

    #[test]
    fn test_logical_key_buckets_by_hour() {
        let a = event("0x1", 7200);
        let b = event("0x2", 7200 + 3599);
        let c = event("0x3", 7200 + 3600);
        assert_eq!(logical_trade_key(ACCOUNT, &a), logical_trade_key(ACCOUNT, &b));
        assert_ne!(logical_trade_key(ACCOUNT, &a), logical_trade_key(ACCOUNT, &c));
        assert_eq!(
            logical_trade_key(ACCOUNT, &a),
            format!("{}|0xcond|TRADE|2", ACCOUNT)
        );
    }

    #[test]
    fn test_detect_sub_kind_from_slug() {
        let mut e = event("0x1", NOW);
        e.slug = "btc-updown-15m-1760000000".to_string();
        assert_eq!(detect_sub_kind(&e), Some(SubKind::UpDown15m));

        e.slug = "eth-updown-5m-1760000000".to_string();
        assert_eq!(detect_sub_kind(&e), Some(SubKind::UpDown5m));

        e.slug = "will-it-rain".to_string();
        assert_eq!(detect_sub_kind(&e), None);
    }

    #[test]
    fn test_detect_sub_kind_from_title() {
        assert_eq!(
            detect_sub_kind(&titled("Bitcoin Up or Down - October 17, 3:15PM-3:30PM ET")),
            Some(SubKind::UpDown15m)
        );
        assert_eq!(
            detect_sub_kind(&titled("Ethereum Up or Down - October 17, 3:15-3:20PM ET")),
            Some(SubKind::UpDown5m)
        );
        assert_eq!(
            detect_sub_kind(&titled("Solana Up or Down - October 17, 11:55PM-12:00AM ET")),
            Some(SubKind::UpDown5m)
        );
        // Hourly markets are not micro-interval
        assert_eq!(
            detect_sub_kind(&titled("Bitcoin Up or Down - October 17, 3PM ET")),
            None
        );
        assert_eq!(
            detect_sub_kind(&titled("Bitcoin Up or Down - October 17, 3:00PM-4:00PM ET")),
            None
        );
        // A time range alone is not enough
        assert_eq!(detect_sub_kind(&titled("Debate starts 3:15PM-3:30PM ET")), None);
    }

    #[test]
    fn test_suppressor_first_time_only() {
        let s = Suppressor::default();
        assert!(s.is_empty());
        assert!(s.first_time("k"));
        assert!(!s.first_time("k"));
        assert!(s.first_time("other"));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_classify_order() {
        let classifier = Classifier::new(FilterFlags::default(), 24);
        let standard = AccountRecord::standard(ACCOUNT);
        let fast = AccountRecord::fast_cycle(ACCOUNT, 900);

        assert_eq!(
            classifier.classify(&standard, &event("0x1", NOW - 25 * 3600), NOW),
            Verdict::TooOld
        );

        let mut updown = event("0x2", NOW - 10);
        updown.slug = "btc-updown-15m-1".into();
        assert_eq!(
            classifier.classify(&fast, &updown, NOW),
            Verdict::Filtered(SubKind::UpDown15m)
        );

        assert_eq!(
            classifier.classify(&fast, &event("0x3", NOW - 900), NOW),
            Verdict::FastCycleStale { age_secs: 900 }
        );
        assert_eq!(
            classifier.classify(&fast, &event("0x4", NOW - 899), NOW),
            Verdict::FastCycleFresh { age_secs: 899 }
        );
        assert_eq!(
            classifier.classify(&standard, &event("0x5", NOW - 300), NOW),
            Verdict::Candidate
        );
    }

    #[test]
    fn test_enabled_filter_passes_through() {
        let flags = FilterFlags {
            enable_15m_updown: true,
            enable_5m_updown: false,
        };
        let classifier = Classifier::new(flags, 24);
        let standard = AccountRecord::standard(ACCOUNT);

        let mut e = event("0x1", NOW - 60);
        e.slug = "btc-updown-15m-1".into();
        assert_eq!(classifier.classify(&standard, &e, NOW), Verdict::Candidate);

        e.slug = "btc-updown-5m-1".into();
        assert_eq!(
            classifier.classify(&standard, &e, NOW),
            Verdict::Filtered(SubKind::UpDown5m)
        );
    }

    #[test]
    fn test_drop_logs_are_suppressed_per_key() {
        let classifier = Classifier::new(FilterFlags::default(), 24);
        let fast = AccountRecord::fast_cycle(ACCOUNT, 900);

        // Two hashes, same logical trade
        let a = event("0xa", NOW - 2000);
        let b = event("0xb", NOW - 2000);
        classifier.classify(&fast, &a, NOW);
        classifier.classify(&fast, &b, NOW);
        classifier.classify(&fast, &a, NOW);
        assert_eq!(classifier.suppressed_keys(), 1);

        let mut filtered = event("0xc", NOW);
        filtered.slug = "x-updown-5m-1".into();
        classifier.classify(&fast, &filtered, NOW);
        classifier.classify(&fast, &filtered, NOW);
        assert_eq!(classifier.suppressed_keys(), 2);
    }
}
