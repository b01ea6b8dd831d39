use std::time::Duration;

/// A time-granularity partition for stored segments.
///
/// Buckets form a totally ordered finite set, from finest to coarsest:
/// `1h < 1d < 1w < 1m < 3m < 6m < 1y < lt`. Order is the compaction
/// direction — compacting a bucket produces segments in a coarser one.
/// `lt` ("long term") is terminal and never compacts further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Hour1,
    Day1,
    Week1,
    Month1,
    Month3,
    Month6,
    Year1,
    LongTerm,
}

impl Bucket {
    pub const BUCKET_1H: &'static str = "1h";
    pub const BUCKET_1D: &'static str = "1d";
    pub const BUCKET_1W: &'static str = "1w";
    pub const BUCKET_1M: &'static str = "1m";
    pub const BUCKET_3M: &'static str = "3m";
    pub const BUCKET_6M: &'static str = "6m";
    pub const BUCKET_1Y: &'static str = "1y";
    pub const BUCKET_LT: &'static str = "lt";

    /// Return the canonical string tag for this bucket.
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Hour1 => Self::BUCKET_1H,
            Bucket::Day1 => Self::BUCKET_1D,
            Bucket::Week1 => Self::BUCKET_1W,
            Bucket::Month1 => Self::BUCKET_1M,
            Bucket::Month3 => Self::BUCKET_3M,
            Bucket::Month6 => Self::BUCKET_6M,
            Bucket::Year1 => Self::BUCKET_1Y,
            Bucket::LongTerm => Self::BUCKET_LT,
        }
    }

    /// Parse a canonical bucket tag. Unknown tags fall back to `1h`,
    /// matching the reverse-index legacy fallback used elsewhere.
    pub fn from_str_lossy(s: &str) -> Bucket {
        match s {
            Self::BUCKET_1D => Bucket::Day1,
            Self::BUCKET_1W => Bucket::Week1,
            Self::BUCKET_1M => Bucket::Month1,
            Self::BUCKET_3M => Bucket::Month3,
            Self::BUCKET_6M => Bucket::Month6,
            Self::BUCKET_1Y => Bucket::Year1,
            Self::BUCKET_LT => Bucket::LongTerm,
            _ => Bucket::Hour1,
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn bucket_1h() -> Bucket { Bucket::Hour1 }
pub fn bucket_1d() -> Bucket { Bucket::Day1 }
pub fn bucket_1w() -> Bucket { Bucket::Week1 }
pub fn bucket_1m() -> Bucket { Bucket::Month1 }
pub fn bucket_3m() -> Bucket { Bucket::Month3 }
pub fn bucket_6m() -> Bucket { Bucket::Month6 }
pub fn bucket_1y() -> Bucket { Bucket::Year1 }
pub fn bucket_lt() -> Bucket { Bucket::LongTerm }

/// All buckets, ordered finest to coarsest.
pub fn all_buckets() -> Vec<Bucket> {
    vec![
        Bucket::Hour1,
        Bucket::Day1,
        Bucket::Week1,
        Bucket::Month1,
        Bucket::Month3,
        Bucket::Month6,
        Bucket::Year1,
        Bucket::LongTerm,
    ]
}

/// Buckets eligible to be scanned for compaction, in cascade order.
/// `lt` is terminal and excluded — nothing compacts out of it.
pub fn compactable_buckets() -> Vec<Bucket> {
    vec![
        Bucket::Hour1,
        Bucket::Day1,
        Bucket::Week1,
        Bucket::Month1,
        Bucket::Month3,
        Bucket::Month6,
        Bucket::Year1,
    ]
}

/// Map a time span to the coarsest bucket whose span it fits within.
/// Used to pick the destination bucket for a compacted segment based on
/// the spread of timestamps it summarizes.
pub fn bucket_for_span(span: Duration) -> Bucket {
    const HOUR: u64 = 3600;
    const DAY: u64 = 24 * HOUR;
    const WEEK: u64 = 7 * DAY;
    const MONTH: u64 = 30 * DAY;

    let secs = span.as_secs();
    if secs <= HOUR {
        Bucket::Hour1
    } else if secs <= DAY {
        Bucket::Day1
    } else if secs <= WEEK {
        Bucket::Week1
    } else if secs <= MONTH {
        Bucket::Month1
    } else if secs <= 3 * MONTH {
        Bucket::Month3
    } else if secs <= 6 * MONTH {
        Bucket::Month6
    } else if secs <= 365 * DAY {
        Bucket::Year1
    } else {
        Bucket::LongTerm
    }
}
