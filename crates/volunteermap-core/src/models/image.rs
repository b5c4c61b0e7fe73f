use serde::{Deserialize, Serialize};

use crate::utils::format_bytes;

/// An image hosted by the third-party image service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UploadedImage {
    pub url: String,
    pub filename: String,
    pub size: u64,
}

impl UploadedImage {
    pub fn size_display(&self) -> String {
        format_bytes(self.size, 2)
    }
}
