use domain_auth::AuthApiDoc;
use domain_vector::VectorApiDoc;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Search API", description = "Site-scoped vector search"),
    paths(crate::api::sites::list_sites),
    components(schemas(crate::api::sites::SitesResponse)),
    nest((path = "/api", api = VectorApiDoc)),
    tags((name = "sites", description = "Sites with indexed documents"))
)]
struct BaseDoc;

/// Complete API documentation: app routes, vector routes and auth routes
pub struct ApiDoc;

impl OpenApi for ApiDoc {
    fn openapi() -> utoipa::openapi::OpenApi {
        let mut doc = BaseDoc::openapi();
        doc.merge(AuthApiDoc::openapi());
        doc
    }
}
