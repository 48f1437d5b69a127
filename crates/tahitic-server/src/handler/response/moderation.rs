use serde::{Deserialize, Serialize};
use tahitic_postgres::query::{ImageModerationRow, ModerationSummary, TextModerationRow};

/// Moderation activity report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationStatusResponse {
    pub success: bool,
    pub sistema: String,
    pub periodo: String,
    pub estadisticas: ModerationStatistics,
}

/// Statistics split by content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationStatistics {
    pub texto: TextModerationStatistics,
    pub imagenes: ImageModerationStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextModerationStatistics {
    pub logs: Vec<TextModerationRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageModerationStatistics {
    pub logs: Vec<ImageModerationRow>,
    pub total_analizadas: i64,
}

impl From<ModerationSummary> for ModerationStatusResponse {
    fn from(summary: ModerationSummary) -> Self {
        let total_analizadas = summary.total_analizadas();

        Self {
            success: true,
            sistema: "activo".to_owned(),
            periodo: "7 días".to_owned(),
            estadisticas: ModerationStatistics {
                texto: TextModerationStatistics {
                    logs: summary.texto,
                },
                imagenes: ImageModerationStatistics {
                    logs: summary.imagenes,
                    total_analizadas,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shape() -> anyhow::Result<()> {
        let summary = ModerationSummary::new(
            vec![TextModerationRow {
                accion: "rechazado".into(),
                total: 4,
                avg_longitud_texto: Some(120.5),
            }],
            vec![
                ImageModerationRow {
                    es_aprobado: Some(true),
                    total: 7,
                },
                ImageModerationRow {
                    es_aprobado: Some(false),
                    total: 2,
                },
            ],
        );

        let json = serde_json::to_value(ModerationStatusResponse::from(summary))?;
        assert_eq!(json["success"], true);
        assert_eq!(json["sistema"], "activo");
        assert_eq!(json["periodo"], "7 días");
        assert_eq!(json["estadisticas"]["texto"]["logs"][0]["accion"], "rechazado");
        assert_eq!(json["estadisticas"]["imagenes"]["total_analizadas"], 9);
        Ok(())
    }
}
