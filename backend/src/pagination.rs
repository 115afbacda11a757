use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

const ALLOWED_LIMITS: [usize; 3] = [5, 10, 30];

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    10
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PageParams {
    pub fn validate(&self) -> ApiResult<()> {
        if self.page < 1 {
            return Err(ApiError::Validation("page must be >= 1".into()));
        }
        if !ALLOWED_LIMITS.contains(&self.limit) {
            return Err(ApiError::Validation("limit must be 5, 10 or 30".into()));
        }
        Ok(())
    }

    pub fn paginate<T>(&self, items: Vec<T>) -> ApiResult<Page<T>> {
        self.validate()?;
        let total_items = items.len();
        let data = items
            .into_iter()
            .skip((self.page - 1).saturating_mul(self.limit))
            .take(self.limit)
            .collect();

        Ok(Page {
            data,
            pagination: PageMeta {
                page: self.page,
                limit: self.limit,
                total_items,
                total_pages: total_items.div_ceil(self.limit),
            },
        })
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PageMeta {
    pub page: usize,
    pub limit: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PageMeta,
}
