//! Key derivation for the two subscription indexes.
//!
//! The by-user index is keyed by a bucketed user id: a 5-digit zero-padded
//! bucket, a separator, then the raw user id. Buckets sort lexicographically,
//! which is what makes bucket range scans work, so the bucket is always
//! exactly [`BUCKET_WIDTH`] digits.
//!
//! The bucket hash is part of the storage layout. Changing it reshuffles
//! every user into a different bucket, so it is pinned to FNV-1a 32-bit and
//! versioned through [`BUCKET_HASH_VERSION`].

use std::fmt;

/// Number of buckets users are spread over.
pub const BUCKET_COUNT: u32 = 100_000;

/// Width of the zero-padded bucket prefix.
pub const BUCKET_WIDTH: usize = 5;

/// Separator between bucket prefix and user id.
pub const SEPARATOR: char = '|';

/// Version of the bucket hash layout.
pub const BUCKET_HASH_VERSION: u32 = 1;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a 32-bit over the UTF-8 bytes of `input`.
pub fn fnv1a_32(input: &str) -> u32 {
    input.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Bucket a user id falls into, in `[0, BUCKET_COUNT)`.
pub fn bucket_of(user_id: &str) -> u32 {
    fnv1a_32(user_id) % BUCKET_COUNT
}

/// Strip every character that is not a letter or digit.
///
/// Providers format the same device token differently (spaces, dashes,
/// angle brackets); all of them collapse to the same normalized token.
pub fn normalize_token(token: &str) -> String {
    token.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Bucketed user key, e.g. `04217|alice`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey(String);

impl BucketKey {
    /// Derive the key for a user from the bucket hash.
    pub fn for_user(user_id: &str) -> Self {
        Self(format!(
            "{:0width$}{SEPARATOR}{user_id}",
            bucket_of(user_id),
            width = BUCKET_WIDTH
        ))
    }

    /// Build a key from an explicit bucket.
    pub fn from_parts(bucket: u32, user_id: &str) -> color_eyre::eyre::Result<Self> {
        check_bucket(bucket)?;

        Ok(Self(format!(
            "{:0width$}{SEPARATOR}{user_id}",
            bucket,
            width = BUCKET_WIDTH
        )))
    }

    /// The zero-padded bucket prefix.
    pub fn bucket_str(&self) -> &str {
        &self.0[..BUCKET_WIDTH]
    }

    /// The numeric bucket.
    pub fn bucket(&self) -> u32 {
        // Constructors only ever write ASCII digits into the prefix.
        self.bucket_str().parse().unwrap_or_default()
    }

    /// The raw user id after the separator.
    pub fn user_id(&self) -> &str {
        &self.0[BUCKET_WIDTH + SEPARATOR.len_utf8()..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BucketKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn check_bucket(bucket: u32) -> color_eyre::eyre::Result<()> {
    if bucket >= BUCKET_COUNT {
        color_eyre::eyre::bail!("bucket {} out of range (max {})", bucket, BUCKET_COUNT - 1);
    }
    Ok(())
}

/// Exclusive key bounds for a bucket range scan.
///
/// Matches keys with `low < key < high`. `low` is the start bucket followed by
/// one separator, so every user in the start bucket sorts above it. `high` is
/// the end bucket followed by two separators, which only sorts above end
/// bucket keys whose user id starts with a character below `|`. Ids starting
/// with `|`, `}`, `~` or any non-ASCII character fall outside, so pass
/// `end = N + 1` to be sure bucket `N` is covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeBounds {
    pub low: String,
    pub high: String,
}

impl RangeBounds {
    /// Whether `key` falls strictly between the bounds.
    pub fn contains(&self, key: &str) -> bool {
        self.low.as_str() < key && key < self.high.as_str()
    }
}

/// Compute the scan bounds from bucket `start` up to bucket `end`.
///
/// Both buckets must be below [`BUCKET_COUNT`]; a wider number would break the
/// fixed-width ordering the scan relies on.
pub fn range_bounds(start: u32, end: u32) -> color_eyre::eyre::Result<RangeBounds> {
    check_bucket(start)?;
    check_bucket(end)?;

    Ok(RangeBounds {
        low: format!("{:0width$}{SEPARATOR}", start, width = BUCKET_WIDTH),
        high: format!(
            "{:0width$}{SEPARATOR}{SEPARATOR}",
            end,
            width = BUCKET_WIDTH
        ),
    })
}
