use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Course assigned to materials uploaded without one.
pub const DEFAULT_COURSE: &str = "General";

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Durable metadata for one uploaded file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Material {
    pub id: Uuid,
    pub course: String,
    pub semester: Option<String>,
    pub subject: String,
    pub description: Option<String>,
    pub original_name: String,
    /// Opaque blob store key. Never leaves the server.
    pub stored_reference: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// Lower-cased extension of the display name, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialResponse {
    pub id: Uuid,
    pub course: String,
    pub semester: Option<String>,
    pub subject: String,
    pub description: Option<String>,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Material> for MaterialResponse {
    fn from(material: Material) -> Self {
        MaterialResponse {
            id: material.id,
            course: material.course,
            semester: material.semester,
            subject: material.subject,
            description: material.description,
            original_name: material.original_name,
            mime_type: material.mime_type,
            size_bytes: material.size_bytes,
            uploaded_by: material.uploaded_by,
            created_at: material.created_at,
            updated_at: material.updated_at,
        }
    }
}

/// The editable part of a material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialMetadata {
    pub course: String,
    pub semester: Option<String>,
    pub subject: String,
    pub description: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl MaterialMetadata {
    /// Builds metadata from the text fields of an upload form.
    pub fn from_form(
        course: Option<String>,
        semester: Option<String>,
        subject: Option<String>,
        description: Option<String>,
    ) -> Result<Self, AppError> {
        let subject = non_blank(subject)
            .ok_or_else(|| AppError::InvalidInput("Subject is required".to_string()))?;
        Ok(MaterialMetadata {
            course: non_blank(course).unwrap_or_else(|| DEFAULT_COURSE.to_string()),
            semester: non_blank(semester),
            subject,
            description: non_blank(description),
        })
    }

    pub fn of(material: &Material) -> Self {
        MaterialMetadata {
            course: material.course.clone(),
            semester: material.semester.clone(),
            subject: material.subject.clone(),
            description: material.description.clone(),
        }
    }
}

/// Everything the record store needs to persist a new material.
#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub metadata: MaterialMetadata,
    pub original_name: String,
    pub stored_reference: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
}

/// Partial metadata update. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialPatch {
    #[validate(length(max = 200))]
    pub course: Option<String>,
    #[validate(length(max = 100))]
    pub semester: Option<String>,
    #[validate(length(max = 200))]
    pub subject: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

impl MaterialPatch {
    /// Applies the patch on top of `current`.
    ///
    /// An empty subject is rejected, an empty course falls back to
    /// [`DEFAULT_COURSE`] and an empty semester or description clears the field.
    pub fn apply(self, current: MaterialMetadata) -> Result<MaterialMetadata, AppError> {
        let subject = match self.subject {
            Some(subject) => {
                let subject = subject.trim().to_string();
                if subject.is_empty() {
                    return Err(AppError::InvalidInput(
                        "Subject cannot be empty".to_string(),
                    ));
                }
                subject
            }
            None => current.subject,
        };

        let course = match self.course {
            Some(course) => non_blank(Some(course)).unwrap_or_else(|| DEFAULT_COURSE.to_string()),
            None => current.course,
        };

        Ok(MaterialMetadata {
            course,
            semester: match self.semester {
                Some(semester) => non_blank(Some(semester)),
                None => current.semester,
            },
            subject,
            description: match self.description {
                Some(description) => non_blank(Some(description)),
                None => current.description,
            },
        })
    }
}

/// How free text is matched against subject, description, course and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Tokenized match backed by the store's text index.
    FullText(String),
    /// Case-insensitive substring match.
    Substring(String),
}

impl SearchQuery {
    pub fn text(&self) -> &str {
        match self {
            SearchQuery::FullText(text) | SearchQuery::Substring(text) => text,
        }
    }
}

/// Exact-match filters plus an optional free-text query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialFilter {
    pub course: Option<String>,
    pub semester: Option<String>,
    pub subject: Option<String>,
    pub query: Option<SearchQuery>,
}

impl MaterialFilter {
    /// Checks a material against the filter the way the in-process store does.
    pub fn matches(&self, material: &Material) -> bool {
        if let Some(course) = &self.course {
            if &material.course != course {
                return false;
            }
        }
        if let Some(semester) = &self.semester {
            if material.semester.as_ref() != Some(semester) {
                return false;
            }
        }
        if let Some(subject) = &self.subject {
            if &material.subject != subject {
                return false;
            }
        }
        match &self.query {
            None => true,
            Some(query) => {
                let needle = query.text().to_lowercase();
                let mut haystacks = [
                    Some(material.subject.as_str()),
                    material.description.as_deref(),
                    Some(material.course.as_str()),
                    Some(material.original_name.as_str()),
                ]
                .into_iter()
                .flatten();
                match query {
                    SearchQuery::Substring(_) => {
                        haystacks.any(|h| h.to_lowercase().contains(&needle))
                    }
                    SearchQuery::FullText(_) => {
                        let words: Vec<String> = haystacks
                            .flat_map(|h| {
                                h.split(|c: char| !c.is_alphanumeric())
                                    .map(|w| w.to_lowercase())
                                    .collect::<Vec<_>>()
                            })
                            .collect();
                        needle
                            .split(|c: char| !c.is_alphanumeric())
                            .filter(|term| !term.is_empty())
                            .all(|term| words.iter().any(|w| w == term))
                    }
                }
            }
        }
    }
}

/// Effective page window. Always has `page >= 1` and `limit` in `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Missing or zero `limit` means the default; anything else is clamped.
    pub fn from_request(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = match limit {
            None | Some(0) => DEFAULT_PAGE_LIMIT,
            Some(limit) => limit.clamp(1, MAX_PAGE_LIMIT),
        };
        Pagination { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// `"Computer Science"` becomes `"computer-science"`.
pub fn course_slug(course: &str) -> String {
    course
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

/// Materials of one course, as the browse page renders them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseGroup {
    pub id: String,
    pub name: String,
    pub materials: Vec<MaterialResponse>,
}

/// Buckets materials by course, keeping first-seen order.
pub fn group_by_course(materials: Vec<MaterialResponse>) -> Vec<CourseGroup> {
    let mut groups: Vec<CourseGroup> = Vec::new();
    for material in materials {
        let name = if material.course.trim().is_empty() {
            DEFAULT_COURSE.to_string()
        } else {
            material.course.clone()
        };
        let id = course_slug(&name);
        match groups.iter_mut().find(|g| g.id == id) {
            Some(group) => group.materials.push(material),
            None => groups.push(CourseGroup {
                id,
                name,
                materials: vec![material],
            }),
        }
    }
    groups
}
