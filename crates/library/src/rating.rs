use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use shelfmark_core::{DocumentId, DomainError, DomainResult, timestamp};

use crate::non_blank;

/// Stored rating document. One per (book, user).
///
/// `rating` is kept as raw JSON: older documents hold numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub book_id: String,
    pub user_email: String,
    pub rating: Value,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Rating {
    pub fn numeric_value(&self) -> Option<f64> {
        coerce_rating(&self.rating)
    }
}

/// A validated rating submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingSubmission {
    pub book_id: String,
    pub user_email: String,
    pub rating: f64,
}

impl RatingSubmission {
    /// All three fields are required; the rating must be numeric (a number
    /// or a string holding one).
    pub fn new(
        book_id: Option<String>,
        user_email: Option<String>,
        rating: Option<Value>,
    ) -> DomainResult<Self> {
        let (Some(book_id), Some(user_email), Some(rating)) =
            (non_blank(book_id), non_blank(user_email), rating.filter(|v| !v.is_null()))
        else {
            return Err(DomainError::invalid_input(
                "bookId, userEmail and rating are required",
            ));
        };

        let rating = coerce_rating(&rating)
            .ok_or_else(|| DomainError::invalid_input("rating must be a number"))?;

        Ok(Self {
            book_id,
            user_email,
            rating,
        })
    }
}

/// Numeric view of a stored rating value.
///
/// Accepts JSON numbers and strings that parse as finite numbers.
pub fn coerce_rating(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Aggregate view of a book's ratings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingSummary {
    /// Mean rating, one decimal place; `None` when nothing is rated.
    pub average: Option<String>,
    pub count: usize,
    pub ratings: Vec<Rating>,
}

impl RatingSummary {
    /// Mean of the coercible values; uncoercible values are left out of the
    /// mean but kept in the raw list.
    pub fn from_ratings(ratings: Vec<Rating>) -> Self {
        let values: Vec<f64> = ratings.iter().filter_map(Rating::numeric_value).collect();
        let average = if values.is_empty() {
            None
        } else {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            Some(format_one_decimal(mean))
        };

        Self {
            average,
            count: ratings.len(),
            ratings,
        }
    }
}

/// Half-up rounding to one decimal.
fn format_one_decimal(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    format!("{rounded:.1}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rating(value: Value) -> Rating {
        Rating {
            id: DocumentId::new(),
            book_id: "book-1".into(),
            user_email: "reader@example.com".into(),
            rating: value,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn empty_set_has_no_average() {
        let summary = RatingSummary::from_ratings(vec![]);
        assert_eq!(summary.average, None);
        assert_eq!(summary.count, 0);
        assert!(summary.ratings.is_empty());
    }

    #[test]
    fn average_of_three_four_five_is_four() {
        let summary =
            RatingSummary::from_ratings(vec![rating(json!(3)), rating(json!(4)), rating(json!(5))]);
        assert_eq!(summary.average.as_deref(), Some("4.0"));
        assert_eq!(summary.count, 3);
    }

    #[test]
    fn string_ratings_are_coerced() {
        let summary = RatingSummary::from_ratings(vec![rating(json!("4")), rating(json!(5))]);
        assert_eq!(summary.average.as_deref(), Some("4.5"));
    }

    #[test]
    fn uncoercible_values_are_left_out_of_the_mean() {
        let summary =
            RatingSummary::from_ratings(vec![rating(json!("great")), rating(json!(2))]);
        assert_eq!(summary.average.as_deref(), Some("2.0"));
        assert_eq!(summary.count, 2);

        let summary = RatingSummary::from_ratings(vec![rating(json!(null))]);
        assert_eq!(summary.average, None);
    }

    #[test]
    fn mean_is_rounded_half_up() {
        // 4.25 is exact in binary; half-up gives 4.3.
        let summary = RatingSummary::from_ratings(vec![
            rating(json!(4)),
            rating(json!(4)),
            rating(json!(4)),
            rating(json!(5)),
        ]);
        assert_eq!(summary.average.as_deref(), Some("4.3"));

        let summary =
            RatingSummary::from_ratings(vec![rating(json!(1)), rating(json!(2)), rating(json!(2))]);
        assert_eq!(summary.average.as_deref(), Some("1.7"));
    }

    #[test]
    fn submission_requires_every_field() {
        let missing_book = RatingSubmission::new(None, Some("a@b.c".into()), Some(json!(4)));
        let missing_user = RatingSubmission::new(Some("b".into()), None, Some(json!(4)));
        let missing_rating = RatingSubmission::new(Some("b".into()), Some("a@b.c".into()), None);
        let null_rating =
            RatingSubmission::new(Some("b".into()), Some("a@b.c".into()), Some(Value::Null));

        for result in [missing_book, missing_user, missing_rating, null_rating] {
            assert!(matches!(result, Err(DomainError::InvalidInput(_))));
        }
    }

    #[test]
    fn submission_coerces_numeric_strings() {
        let sub =
            RatingSubmission::new(Some("b".into()), Some("a@b.c".into()), Some(json!("3.5")))
                .unwrap();
        assert_eq!(sub.rating, 3.5);
    }

    #[test]
    fn submission_rejects_non_numeric_rating() {
        let result =
            RatingSubmission::new(Some("b".into()), Some("a@b.c".into()), Some(json!("five")));
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn coercion_rejects_non_finite_and_structured_values() {
        assert_eq!(coerce_rating(&json!("NaN")), None);
        assert_eq!(coerce_rating(&json!({"v": 1})), None);
        assert_eq!(coerce_rating(&json!(true)), None);
        assert_eq!(coerce_rating(&json!(" 2 ")), Some(2.0));
    }
}
