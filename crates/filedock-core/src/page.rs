use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Zero-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page_no: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page_no: u32, page_size: u32) -> Result<Self, CoreError> {
        if page_size == 0 {
            return Err(CoreError::InvalidInput(
                "page size must not be less than one".into(),
            ));
        }
        Ok(Self { page_no, page_size })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page_no) * u64::from(self.page_size)
    }
}

/// One page of results plus the total element count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub count: u64,
    pub page_no: u32,
    pub page_size: u32,
    pub rows: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: PageRequest, count: u64, rows: Vec<T>) -> Self {
        Self {
            count,
            page_no: request.page_no,
            page_size: request.page_size,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_page_size() {
        assert!(PageRequest::new(0, 0).is_err());
        assert!(PageRequest::new(3, 1).is_ok());
    }

    #[test]
    fn offset_multiplies_without_overflow() {
        assert_eq!(PageRequest::new(0, 25).unwrap().offset(), 0);
        assert_eq!(PageRequest::new(2, 25).unwrap().offset(), 50);
        let big = PageRequest::new(u32::MAX, u32::MAX).unwrap();
        assert_eq!(big.offset(), u64::from(u32::MAX) * u64::from(u32::MAX));
    }

    #[test]
    fn page_serializes_envelope_fields() {
        let page = Page::new(PageRequest::new(0, 25).unwrap(), 2, vec!["a", "b"]);
        let v = serde_json::to_value(&page).unwrap();
        assert_eq!(v["count"], 2);
        assert_eq!(v["pageNo"], 0);
        assert_eq!(v["pageSize"], 25);
        assert_eq!(v["rows"].as_array().unwrap().len(), 2);
    }
}
