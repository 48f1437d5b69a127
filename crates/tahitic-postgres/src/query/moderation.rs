//! Aggregates over the moderation audit tables.
//!
//! Both tables are written by the moderation services; this module only reads
//! counts over the trailing seven days.

use std::future::Future;

use diesel::QueryableByName;
use diesel::sql_types::{BigInt, Bool, Double, Nullable, Text};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

use crate::{PgConnection, PgError, PgResult, TRACING_TARGET_QUERY};

const TEXT_MODERATION_STATS: &str = "\
    SELECT accion::text AS accion, \
           COUNT(*) AS total, \
           AVG(LENGTH(contenido_texto))::float8 AS avg_longitud_texto \
    FROM logs_moderacion \
    WHERE creado_en >= NOW() - INTERVAL '7 days' \
    GROUP BY accion";

const IMAGE_MODERATION_STATS: &str = "\
    SELECT es_aprobado, \
           COUNT(*) AS total \
    FROM logs_moderacion_imagenes \
    WHERE creado_en >= NOW() - INTERVAL '7 days' \
    GROUP BY es_aprobado";

/// Text moderation decisions grouped by action.
#[derive(Debug, Clone, PartialEq, QueryableByName, Serialize, Deserialize)]
pub struct TextModerationRow {
    /// Moderation action taken.
    #[diesel(sql_type = Text)]
    pub accion: String,
    /// Number of log entries with this action.
    #[diesel(sql_type = BigInt)]
    pub total: i64,
    /// Average length of the moderated text.
    #[diesel(sql_type = Nullable<Double>)]
    pub avg_longitud_texto: Option<f64>,
}

/// Image moderation decisions grouped by outcome.
#[derive(Debug, Clone, PartialEq, Eq, QueryableByName, Serialize, Deserialize)]
pub struct ImageModerationRow {
    /// Whether the image was approved; `None` for undecided entries.
    #[diesel(sql_type = Nullable<Bool>)]
    pub es_aprobado: Option<bool>,
    /// Number of log entries with this outcome.
    #[diesel(sql_type = BigInt)]
    pub total: i64,
}

/// Moderation activity over the trailing seven days.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModerationSummary {
    /// Text moderation rows, one per action.
    pub texto: Vec<TextModerationRow>,
    /// Image moderation rows, one per outcome.
    pub imagenes: Vec<ImageModerationRow>,
}

impl ModerationSummary {
    /// Creates a summary from the grouped rows.
    pub fn new(texto: Vec<TextModerationRow>, imagenes: Vec<ImageModerationRow>) -> Self {
        Self { texto, imagenes }
    }

    /// Total number of analysed images across all outcomes.
    pub fn total_analizadas(&self) -> i64 {
        self.imagenes.iter().map(|row| row.total).sum()
    }
}

/// Repository for moderation statistics.
pub trait ModerationRepository {
    /// Aggregates text and image moderation logs over the trailing seven days.
    fn moderation_summary(&mut self) -> impl Future<Output = PgResult<ModerationSummary>> + Send;
}

impl ModerationRepository for PgConnection {
    async fn moderation_summary(&mut self) -> PgResult<ModerationSummary> {
        let texto: Vec<TextModerationRow> = diesel::sql_query(TEXT_MODERATION_STATS)
            .load(&mut *self)
            .await
            .map_err(PgError::from)?;

        let imagenes: Vec<ImageModerationRow> = diesel::sql_query(IMAGE_MODERATION_STATS)
            .load(self)
            .await
            .map_err(PgError::from)?;

        let summary = ModerationSummary::new(texto, imagenes);
        tracing::debug!(
            target: TRACING_TARGET_QUERY,
            text_groups = summary.texto.len(),
            image_groups = summary.imagenes.len(),
            total_analizadas = summary.total_analizadas(),
            "Aggregated moderation statistics"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_counts_every_image_outcome() {
        let summary = ModerationSummary::new(
            vec![],
            vec![
                ImageModerationRow {
                    es_aprobado: Some(true),
                    total: 12,
                },
                ImageModerationRow {
                    es_aprobado: Some(false),
                    total: 3,
                },
                ImageModerationRow {
                    es_aprobado: None,
                    total: 1,
                },
            ],
        );

        assert_eq!(summary.total_analizadas(), 16);
    }

    #[test]
    fn empty_summary_has_no_analysed_images() {
        assert_eq!(ModerationSummary::default().total_analizadas(), 0);
    }
}
