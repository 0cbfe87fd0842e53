// Wire types for the HTTP API.
//
// Field names are Spanish because existing callers of the moderation server
// already read them. Internally everything goes through `Decision`; these
// structs only shape it for the wire.

use serde::{Deserialize, Serialize};

use crate::moderation::models::{Category, DetectionFinding, ImageCharacteristics};
use crate::moderation::policy::PolicyThresholds;
use crate::moderation::service::ModerationReport;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub image_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Hallazgo {
    pub etiqueta: String,
    pub categoria: String,
    pub puntuacion: f64,
    pub fuente: String,
}

impl From<&DetectionFinding> for Hallazgo {
    fn from(f: &DetectionFinding) -> Self {
        Self {
            etiqueta: f.label.clone(),
            categoria: f.category.to_string(),
            puntuacion: f.score,
            fuente: f.source.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalisisViolencia {
    pub es_violento: bool,
    pub probabilidad_violencia: f64,
    pub hallazgos: Vec<Hallazgo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalisisArmas {
    pub armas_detectadas: bool,
    pub confianza: f64,
    pub hallazgos: Vec<Hallazgo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalisisContenidoSexual {
    pub es_explicito: bool,
    pub probabilidad: f64,
    pub hallazgos: Vec<Hallazgo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Caracteristicas {
    pub ancho: u32,
    pub alto: u32,
    pub relacion_aspecto: f64,
    pub varianza_color: f64,
    pub es_paisaje: bool,
    pub es_retrato: bool,
}

impl From<&ImageCharacteristics> for Caracteristicas {
    fn from(c: &ImageCharacteristics) -> Self {
        Self {
            ancho: c.width,
            alto: c.height,
            relacion_aspecto: c.aspect_ratio,
            varianza_color: c.color_variance,
            es_paisaje: c.is_landscape,
            es_retrato: c.is_portrait,
        }
    }
}

/// Body of a 200 response from `POST /analyze`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub es_apto: bool,
    pub analisis_violencia: AnalisisViolencia,
    pub analisis_armas: AnalisisArmas,
    pub analisis_contenido_sexual: AnalisisContenidoSexual,
    pub puntuacion_riesgo: f64,
    pub razones: Vec<String>,
    pub armas_detectadas_en_violencia: bool,
    pub confianza_armas_violencia: f64,
    pub caracteristicas: Option<Caracteristicas>,
    /// Which policy tier decided, e.g. "hard_reject".
    pub decidido_por: String,
    pub detectores_fallidos: Vec<String>,
    /// Seconds spent in the pipeline.
    pub tiempo_procesamiento: f64,
    pub ruta_imagen: String,
}

impl AnalyzeResponse {
    pub fn from_report(report: &ModerationReport, thresholds: &PolicyThresholds, path: &str) -> Self {
        let decision = &report.decision;
        let risk = &decision.category_breakdown;

        let in_category = |category: Category| -> Vec<Hallazgo> {
            risk.contributing_findings
                .iter()
                .filter(|f| match category {
                    Category::Violence => {
                        matches!(f.category, Category::Violence | Category::GeneralHazard)
                    }
                    other => f.category == other,
                })
                .map(Hallazgo::from)
                .collect()
        };

        Self {
            es_apto: decision.is_admitted,
            analisis_violencia: AnalisisViolencia {
                es_violento: risk.violence_risk > thresholds.high_violence,
                probabilidad_violencia: risk.violence_risk,
                hallazgos: in_category(Category::Violence),
            },
            analisis_armas: AnalisisArmas {
                armas_detectadas: risk.weapon_risk > thresholds.high_weapon,
                confianza: risk.weapon_risk,
                hallazgos: in_category(Category::Weapons),
            },
            analisis_contenido_sexual: AnalisisContenidoSexual {
                es_explicito: risk.sexual_content_risk > thresholds.high_sexual_content,
                probabilidad: risk.sexual_content_risk,
                hallazgos: in_category(Category::SexualContent),
            },
            puntuacion_riesgo: decision.risk_score,
            razones: decision.reasons.clone(),
            armas_detectadas_en_violencia: risk.weapon_risk_via_violence_model
                > thresholds.cross_model_weapon,
            confianza_armas_violencia: risk.weapon_risk_via_violence_model,
            caracteristicas: report.characteristics.as_ref().map(Caracteristicas::from),
            decidido_por: decision.decided_by.to_string(),
            detectores_fallidos: risk
                .failed_detectors
                .iter()
                .map(|f| f.detector.clone())
                .collect(),
            tiempo_procesamiento: report.elapsed.as_secs_f64(),
            ruta_imagen: path.to_string(),
        }
    }
}
