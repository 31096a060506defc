//! Data types returned by the service.

/// A bucket entry from a ListBuckets response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    /// Bucket name.
    pub name: String,
    /// Creation date as reported by the store.
    pub creation_date: Option<String>,
}

/// Bucket owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Owner {
    /// Canonical user ID.
    pub id: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
}

/// Parsed ListBuckets response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBucketsOutput {
    /// Owner information.
    pub owner: Option<Owner>,
    /// Buckets, in the order the store listed them.
    pub buckets: Vec<Bucket>,
}

impl ListBucketsOutput {
    /// Bucket names in listing order.
    pub fn names(&self) -> Vec<String> {
        self.buckets.iter().map(|b| b.name.clone()).collect()
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObjectOutput {
    /// Bytes sent.
    pub content_length: u64,
    /// ETag of the stored object.
    pub e_tag: Option<String>,
    /// Request ID.
    pub request_id: Option<String>,
}

/// Result of a successful download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetObjectOutput {
    /// Bytes written to the destination.
    pub content_length: u64,
    /// ETag of the object.
    pub e_tag: Option<String>,
    /// Content type reported by the store.
    pub content_type: Option<String>,
    /// Request ID.
    pub request_id: Option<String>,
}
