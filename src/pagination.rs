//! Page-number pagination for list views

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{AppError, AppResult};

/// `?page=` query parameter; a number or `last`
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Position of the current page within the result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageInfo {
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub per_page: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<i64>,
    pub previous_page_number: Option<i64>,
    /// 1-based index of the first object on this page (0 when empty)
    pub start_index: i64,
    /// 1-based index of the last object on this page (0 when empty)
    pub end_index: i64,
    #[serde(skip)]
    pub offset: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: i64,
    per_page: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Self {
        Self {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    /// Always at least one page; the first page may be empty
    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /// Resolve the raw `page` parameter into a page
    pub fn page(&self, raw: Option<&str>) -> AppResult<PageInfo> {
        let num_pages = self.num_pages();

        let number = match raw.map(str::trim) {
            None | Some("") => 1,
            Some("last") => num_pages,
            Some(s) => s.parse::<i64>().map_err(|_| {
                AppError::NotFound("Page is not 'last', nor can it be converted to an int".to_string())
            })?,
        };

        if number < 1 {
            return Err(AppError::NotFound("That page number is less than 1".to_string()));
        }
        if number > num_pages {
            return Err(AppError::NotFound("That page contains no results".to_string()));
        }

        let offset = (number - 1) * self.per_page;
        let (start_index, end_index) = if self.count == 0 {
            (0, 0)
        } else {
            (offset + 1, (offset + self.per_page).min(self.count))
        };

        Ok(PageInfo {
            number,
            num_pages,
            count: self.count,
            per_page: self.per_page,
            has_next: number < num_pages,
            has_previous: number > 1,
            next_page_number: (number < num_pages).then_some(number + 1),
            previous_page_number: (number > 1).then_some(number - 1),
            start_index,
            end_index,
            offset,
        })
    }
}

/// Context of a paginated list page
#[derive(Debug, Clone, Serialize)]
pub struct ListContext<T> {
    pub object_list: Vec<T>,
    pub page_obj: PageInfo,
    pub is_paginated: bool,
}

impl<T> ListContext<T> {
    pub fn new(object_list: Vec<T>, page_obj: PageInfo) -> Self {
        let is_paginated = page_obj.num_pages > 1;
        Self {
            object_list,
            page_obj,
            is_paginated,
        }
    }
}
