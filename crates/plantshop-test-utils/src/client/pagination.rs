use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(SortDir::Asc),
            "desc" | "descending" => Some(SortDir::Desc),
            _ => None,
        }
    }
}

impl fmt::Display for SortDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        })
    }
}

/// Paging and sorting for list endpoints.
///
/// Rendered both as `sortField`/`sortDir` and as Spring's `sort=field,dir`
/// since different endpoints of the target read different parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort_field: Option<String>,
    pub sort_dir: Option<SortDir>,
}

impl Pagination {
    pub fn page(page: u32, size: u32) -> Self {
        Self {
            page: Some(page),
            size: Some(size),
            ..Default::default()
        }
    }

    pub fn sorted_by(mut self, field: impl Into<String>, dir: SortDir) -> Self {
        self.sort_field = Some(field.into());
        self.sort_dir = Some(dir);
        self
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(page) = self.page {
            query.push(("page".to_string(), page.to_string()));
        }
        if let Some(size) = self.size {
            query.push(("size".to_string(), size.to_string()));
        }
        if let Some(field) = &self.sort_field {
            query.push(("sortField".to_string(), field.clone()));
            let dir = self.sort_dir.unwrap_or(SortDir::Asc);
            query.push(("sortDir".to_string(), dir.to_string()));
            query.push(("sort".to_string(), format!("{},{}", field, dir)));
        }
        query
    }
}
