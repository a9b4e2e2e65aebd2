//! HTML form binding and cleaning
//!
//! Forms are bound from urlencoded bodies. A form either cleans into typed
//! fields or yields per-field error messages, which handlers send back with
//! the submitted values so the page can be redisplayed.

use std::borrow::Cow;

use chrono::{Duration, NaiveDate};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::{
    author::{Author, AuthorFields},
    book::{Book, BookFields},
};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_DATE: &str = "Enter a valid date.";
pub const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

/// Accepted date input formats, tried in order
const DATE_INPUT_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];

static ISBN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{13}$").expect("valid ISBN pattern"));

/// Field name -> error messages, in field declaration order
pub type FieldErrors = IndexMap<String, Vec<String>>;

/// A form as sent to the page: current values plus errors
#[derive(Debug, Clone, Serialize)]
pub struct FormState<T> {
    pub fields: T,
    pub errors: FieldErrors,
    pub is_bound: bool,
}

impl<T> FormState<T> {
    /// Form shown before any submission
    pub fn unbound(initial: T) -> Self {
        Self {
            fields: initial,
            errors: FieldErrors::new(),
            is_bound: false,
        }
    }

    /// Submitted form that failed cleaning
    pub fn invalid(submitted: T, errors: FieldErrors) -> Self {
        Self {
            fields: submitted,
            errors,
            is_bound: true,
        }
    }
}

pub fn add_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

/// Parse a date using the accepted input formats
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn clean_optional_date(
    raw: &Option<String>,
    field: &str,
    errors: &mut FieldErrors,
) -> Option<NaiveDate> {
    let raw = raw.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    match parse_date(raw) {
        Some(date) => Some(date),
        None => {
            add_error(errors, field, INVALID_DATE);
            None
        }
    }
}

fn validate_required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some(Cow::from(REQUIRED));
        return Err(err);
    }
    Ok(())
}

/// Required text of at most `max` characters, measured after trimming
fn validate_text(value: &str, max: usize) -> Result<(), ValidationError> {
    validate_required(value)?;
    if value.trim().chars().count() > max {
        let mut err = ValidationError::new("length");
        err.message = Some(Cow::from(format!(
            "Ensure this value has at most {} characters.",
            max
        )));
        return Err(err);
    }
    Ok(())
}

fn validate_name(value: &str) -> Result<(), ValidationError> {
    validate_text(value, 100)
}

fn validate_title(value: &str) -> Result<(), ValidationError> {
    validate_text(value, 200)
}

fn validate_summary(value: &str) -> Result<(), ValidationError> {
    validate_text(value, 1000)
}

/// Flatten validator output into `FieldErrors`, ordered like `order`
fn collect_errors(errors: &ValidationErrors, order: &[&str]) -> FieldErrors {
    let mut out = FieldErrors::new();
    for (field, list) in errors.field_errors() {
        let field = field.to_string();
        for err in list.iter() {
            let message = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| err.code.to_string());
            add_error(&mut out, &field, message);
        }
    }
    sort_errors(&mut out, order);
    out
}

fn sort_errors(errors: &mut FieldErrors, order: &[&str]) {
    let rank = |name: &str| order.iter().position(|f| *f == name).unwrap_or(order.len());
    errors.sort_by(|a, _, b, _| rank(a.as_str()).cmp(&rank(b.as_str())));
}

// ---------------------------------------------------------------------------
// Renewal
// ---------------------------------------------------------------------------

/// Librarian form proposing a new due date for a copy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenewBookForm {
    /// Accepts YYYY-MM-DD, MM/DD/YYYY or MM/DD/YY
    #[serde(default)]
    pub renewal_date: Option<String>,
}

impl RenewBookForm {
    pub const PROPOSED_WEEKS: i64 = 3;
    pub const MAX_WEEKS_AHEAD: i64 = 4;

    /// Unbound form proposing today + 3 weeks
    pub fn initial(today: NaiveDate) -> Self {
        let proposed = today + Duration::weeks(Self::PROPOSED_WEEKS);
        Self {
            renewal_date: Some(proposed.format("%Y-%m-%d").to_string()),
        }
    }

    /// Date must lie between today and four weeks ahead, both inclusive
    pub fn clean(&self, today: NaiveDate) -> Result<NaiveDate, FieldErrors> {
        let mut errors = FieldErrors::new();

        let raw = self
            .renewal_date
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let Some(raw) = raw else {
            add_error(&mut errors, "renewal_date", REQUIRED);
            return Err(errors);
        };

        let Some(date) = parse_date(raw) else {
            add_error(&mut errors, "renewal_date", INVALID_DATE);
            return Err(errors);
        };

        if date < today {
            add_error(&mut errors, "renewal_date", "Invalid date - renewal in past");
        } else if date > today + Duration::weeks(Self::MAX_WEEKS_AHEAD) {
            add_error(
                &mut errors,
                "renewal_date",
                "Invalid date - renewal more than 4 weeks ahead",
            );
        }

        if errors.is_empty() {
            Ok(date)
        } else {
            Err(errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Author
// ---------------------------------------------------------------------------

const AUTHOR_FIELDS: [&str; 4] = ["first_name", "last_name", "date_of_birth", "date_of_death"];

/// Placeholder dates prefilled on the author create and update pages
pub const AUTHOR_INITIAL_DATE_OF_BIRTH: &str = "05/01/1965";
pub const AUTHOR_INITIAL_DATE_OF_DEATH: &str = "05/01/2018";

#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AuthorForm {
    #[serde(default)]
    #[validate(custom(function = "validate_name"))]
    pub first_name: String,
    #[serde(default)]
    #[validate(custom(function = "validate_name"))]
    pub last_name: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub date_of_death: Option<String>,
}

impl AuthorForm {
    /// Blank form for a new author
    pub fn initial() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            date_of_birth: Some(AUTHOR_INITIAL_DATE_OF_BIRTH.to_string()),
            date_of_death: Some(AUTHOR_INITIAL_DATE_OF_DEATH.to_string()),
        }
    }

    /// Form for editing `author`; the placeholder dates take precedence
    /// over the stored ones
    pub fn for_update(author: &Author) -> Self {
        Self {
            first_name: author.first_name.clone(),
            last_name: author.last_name.clone(),
            ..Self::initial()
        }
    }

    pub fn clean(&self) -> Result<AuthorFields, FieldErrors> {
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => collect_errors(&e, &AUTHOR_FIELDS),
        };

        let date_of_birth = clean_optional_date(&self.date_of_birth, "date_of_birth", &mut errors);
        let date_of_death = clean_optional_date(&self.date_of_death, "date_of_death", &mut errors);

        if !errors.is_empty() {
            sort_errors(&mut errors, &AUTHOR_FIELDS);
            return Err(errors);
        }

        Ok(AuthorFields {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            date_of_birth,
            date_of_death,
        })
    }
}

// ---------------------------------------------------------------------------
// Book
// ---------------------------------------------------------------------------

const BOOK_FIELDS: [&str; 6] = ["title", "author", "summary", "isbn", "genre", "language"];

#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct BookForm {
    #[serde(default)]
    #[validate(custom(function = "validate_title"))]
    pub title: String,
    /// Author id
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub author: Option<i32>,
    #[serde(default)]
    #[validate(custom(function = "validate_summary"))]
    pub summary: String,
    #[serde(default)]
    pub isbn: String,
    /// Genre ids, one `genre=` pair per selected genre
    #[serde(default)]
    pub genre: Vec<i32>,
    /// Language id
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub language: Option<i32>,
}

impl BookForm {
    pub fn for_update(book: &Book, genre_ids: Vec<i32>) -> Self {
        Self {
            title: book.title.clone(),
            author: book.author_id,
            summary: book.summary.clone(),
            isbn: book.isbn.clone(),
            genre: genre_ids,
            language: book.language_id,
        }
    }

    /// Field-level cleaning; choice existence is checked against the
    /// database by the caller
    pub fn clean(&self) -> Result<BookFields, FieldErrors> {
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => collect_errors(&e, &BOOK_FIELDS),
        };

        let isbn = self.isbn.trim();
        if isbn.is_empty() {
            add_error(&mut errors, "isbn", REQUIRED);
        } else if !ISBN_RE.is_match(isbn) {
            add_error(&mut errors, "isbn", "ISBN must be 13 digits.");
        }

        if self.author.is_none() {
            add_error(&mut errors, "author", REQUIRED);
        }
        if self.genre.is_empty() {
            add_error(&mut errors, "genre", REQUIRED);
        }
        if self.language.is_none() {
            add_error(&mut errors, "language", REQUIRED);
        }

        match (self.author, self.language) {
            (Some(author_id), Some(language_id)) if errors.is_empty() => {
                let mut genre_ids = self.genre.clone();
                genre_ids.sort_unstable();
                genre_ids.dedup();

                Ok(BookFields {
                    title: self.title.trim().to_string(),
                    author_id,
                    summary: self.summary.trim().to_string(),
                    isbn: isbn.to_string(),
                    language_id,
                    genre_ids,
                })
            }
            _ => {
                sort_errors(&mut errors, &BOOK_FIELDS);
                Err(errors)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
    }

    fn renew(raw: &str) -> RenewBookForm {
        RenewBookForm {
            renewal_date: Some(raw.to_string()),
        }
    }

    #[test]
    fn test_parse_date_formats() {
        let may_first = NaiveDate::from_ymd_opt(1965, 5, 1);
        assert_eq!(parse_date("1965-05-01"), may_first);
        assert_eq!(parse_date("05/01/1965"), may_first);
        assert_eq!(parse_date(" 05/01/65 "), may_first);
        assert_eq!(parse_date("1 May 1965"), None);
    }

    #[test]
    fn test_renewal_initial_is_three_weeks_out() {
        let form = RenewBookForm::initial(today());
        assert_eq!(form.renewal_date.as_deref(), Some("2024-07-03"));
        assert_eq!(
            parse_date(form.renewal_date.as_deref().unwrap()),
            Some(today() + Duration::days(21))
        );
    }

    #[test]
    fn test_renewal_accepts_window_bounds() {
        assert_eq!(renew("2024-06-12").clean(today()), Ok(today()));
        assert_eq!(
            renew("2024-07-10").clean(today()),
            Ok(NaiveDate::from_ymd_opt(2024, 7, 10).unwrap())
        );
        assert_eq!(
            renew("07/01/2024").clean(today()),
            Ok(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
        );
    }

    #[test]
    fn test_renewal_rejects_past_date() {
        let errors = renew("2024-06-11").clean(today()).unwrap_err();
        assert_eq!(errors["renewal_date"], vec!["Invalid date - renewal in past"]);
    }

    #[test]
    fn test_renewal_rejects_more_than_four_weeks() {
        let errors = renew("2024-07-11").clean(today()).unwrap_err();
        assert_eq!(
            errors["renewal_date"],
            vec!["Invalid date - renewal more than 4 weeks ahead"]
        );
    }

    #[test]
    fn test_renewal_missing_or_garbled() {
        let errors = RenewBookForm::default().clean(today()).unwrap_err();
        assert_eq!(errors["renewal_date"], vec![REQUIRED]);

        let errors = renew("   ").clean(today()).unwrap_err();
        assert_eq!(errors["renewal_date"], vec![REQUIRED]);

        let errors = renew("next tuesday").clean(today()).unwrap_err();
        assert_eq!(errors["renewal_date"], vec![INVALID_DATE]);
    }

    #[test]
    fn test_author_initial_dates() {
        let form = AuthorForm::initial();
        assert_eq!(form.date_of_birth.as_deref(), Some("05/01/1965"));
        assert_eq!(form.date_of_death.as_deref(), Some("05/01/2018"));

        let stored = Author {
            id: 4,
            first_name: "Ursula".to_string(),
            last_name: "Le Guin".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1929, 10, 21),
            date_of_death: NaiveDate::from_ymd_opt(2018, 1, 22),
        };
        let form = AuthorForm::for_update(&stored);
        assert_eq!(form.last_name, "Le Guin");
        assert_eq!(form.date_of_birth.as_deref(), Some(AUTHOR_INITIAL_DATE_OF_BIRTH));
        assert_eq!(form.date_of_death.as_deref(), Some(AUTHOR_INITIAL_DATE_OF_DEATH));
    }

    #[test]
    fn test_author_clean() {
        let form = AuthorForm {
            first_name: " Terry ".to_string(),
            last_name: "Pratchett".to_string(),
            date_of_birth: Some("1948-04-28".to_string()),
            date_of_death: None,
        };
        let fields = form.clean().unwrap();
        assert_eq!(fields.first_name, "Terry");
        assert_eq!(fields.date_of_birth, NaiveDate::from_ymd_opt(1948, 4, 28));
        assert_eq!(fields.date_of_death, None);
    }

    #[test]
    fn test_author_clean_errors_are_ordered() {
        let form = AuthorForm {
            first_name: String::new(),
            last_name: "x".repeat(101),
            date_of_birth: Some("yesterday".to_string()),
            date_of_death: None,
        };
        let errors = form.clean().unwrap_err();
        let fields: Vec<&str> = errors.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["first_name", "last_name", "date_of_birth"]);
        assert_eq!(errors["first_name"], vec![REQUIRED]);
        assert_eq!(errors["date_of_birth"], vec![INVALID_DATE]);
    }

    #[test]
    fn test_length_is_checked_after_trimming() {
        let form = AuthorForm {
            first_name: format!("{} ", "x".repeat(100)),
            last_name: "Pratchett".to_string(),
            ..Default::default()
        };
        assert_eq!(form.clean().unwrap().first_name.len(), 100);

        let form = AuthorForm {
            last_name: "x".repeat(101),
            ..form
        };
        let errors = form.clean().unwrap_err();
        assert_eq!(
            errors["last_name"],
            vec!["Ensure this value has at most 100 characters."]
        );
    }

    #[test]
    fn test_book_clean() {
        let form = BookForm {
            title: "Small Gods".to_string(),
            author: Some(2),
            summary: "Om returns as a tortoise.".to_string(),
            isbn: "9780552152976".to_string(),
            genre: vec![3, 1, 3],
            language: Some(1),
        };
        let fields = form.clean().unwrap();
        assert_eq!(fields.genre_ids, vec![1, 3]);
        assert_eq!(fields.author_id, 2);
    }

    #[test]
    fn test_book_clean_requires_relations_and_isbn() {
        let form = BookForm {
            title: "Small Gods".to_string(),
            summary: "Om returns as a tortoise.".to_string(),
            isbn: "97805521".to_string(),
            ..Default::default()
        };
        let errors = form.clean().unwrap_err();
        let fields: Vec<&str> = errors.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["author", "isbn", "genre", "language"]);
        assert_eq!(errors["isbn"], vec!["ISBN must be 13 digits."]);
    }
}
