use domain_prediction::PredictionApiDoc;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "Zerg Prediction API",
    version = "0.1.0",
    description = "Find catalog items that look like an uploaded image"
))]
struct ServiceInfo;

/// Service info plus the prediction domain's paths and schemas
pub struct ApiDoc;

impl OpenApi for ApiDoc {
    fn openapi() -> utoipa::openapi::OpenApi {
        let mut doc = ServiceInfo::openapi();
        doc.merge(PredictionApiDoc::openapi());
        doc
    }
}
