//! API documentation served under `/swagger`.
//!
//! `/swagger/doc.json` is the OpenAPI description of the quote routes,
//! derived from the handler annotations in [`crate::app`] and the
//! `ToSchema` impls of [`Quote`] and [`ErrorRecord`]. Every other path below
//! `/swagger` serves a Swagger UI page that loads it.

use utoipa::OpenApi;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

use crate::context::Context;
use crate::error::ErrorRecord;
use crate::http::{Response, StatusCode};
use crate::quotes::Quote;
use crate::router::HandlerResult;

/// Path prefix of the documentation routes.
pub const DOCS_PREFIX: &str = "/swagger";

/// Name of the security scheme every quote route requires.
pub const SECURITY_SCHEME: &str = "KeyAuth";

const SPEC_FILE: &str = "/doc.json";

#[derive(OpenApi)]
#[openapi(
    info(title = "citaty", description = "Read-only quote service"),
    paths(crate::app::list_all, crate::app::random_quote, crate::app::quote_by_id),
    components(schemas(Quote, ErrorRecord)),
    security(("KeyAuth" = [])),
    tags((name = "Quotes", description = "Quote retrieval"))
)]
pub struct ApiDoc;

/// Builds the OpenAPI document. `key_param` names the credential query
/// parameter, which is only known at runtime.
pub fn openapi(key_param: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.components.get_or_insert_with(Default::default).add_security_scheme(
        SECURITY_SCHEME,
        SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new(key_param))),
    );
    doc
}

fn swagger_ui_page() -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>citaty API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {{
      window.ui = SwaggerUIBundle({{ url: "{DOCS_PREFIX}{SPEC_FILE}", dom_id: "#swagger-ui" }});
    }};
  </script>
</body>
</html>
"##
    )
}

/// Serves the documentation. Register it under `/swagger/*`.
pub struct DocsHandler {
    doc: utoipa::openapi::OpenApi,
}

impl DocsHandler {
    pub fn new(key_param: &str) -> Self {
        Self {
            doc: openapi(key_param),
        }
    }

    pub fn respond(&self, ctx: &Context) -> HandlerResult {
        let response = if ctx.params().get("wildcard") == Some(SPEC_FILE) {
            Response::json(StatusCode::Ok, &self.doc)
        } else {
            Response::new(StatusCode::Ok)
                .header("Content-Type", "text/html; charset=utf-8")
                .body(swagger_ui_page())
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::Value;

    use super::*;
    use crate::context::PathParams;
    use crate::http::Request;

    fn ctx_with_wildcard(wildcard: &str) -> Context {
        let (req, _) = Request::parse(b"GET /swagger HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();
        let mut ctx = Context::new(req);
        let mut params = PathParams::new();
        params.insert("wildcard", wildcard);
        ctx.set_params(params);
        ctx
    }

    fn document() -> Value {
        serde_json::to_value(openapi("citaty-key")).unwrap()
    }

    fn keys(value: &Value) -> BTreeSet<String> {
        value.as_object().unwrap().keys().cloned().collect()
    }

    #[test]
    fn document_lists_the_three_routes() {
        let doc = document();
        assert_eq!(
            keys(&doc["paths"]),
            BTreeSet::from(["/".to_owned(), "/random".to_owned(), "/{id}".to_owned()])
        );
        assert_eq!(doc["info"]["title"], "citaty");
    }

    #[test]
    fn security_scheme_uses_the_configured_param() {
        let doc = document();
        let scheme = &doc["components"]["securitySchemes"][SECURITY_SCHEME];
        assert_eq!(scheme["type"], "apiKey");
        assert_eq!(scheme["in"], "query");
        assert_eq!(scheme["name"], "citaty-key");
        assert!(doc["security"][0].get(SECURITY_SCHEME).is_some());
    }

    #[test]
    fn every_operation_documents_its_outcomes() {
        let doc = document();
        for path in ["/", "/random", "/{id}"] {
            let responses = &doc["paths"][path]["get"]["responses"];
            for code in ["200", "401", "404", "500"] {
                assert!(responses[code].is_object(), "{path} lacks {code}");
            }
        }
        let params = &doc["paths"]["/{id}"]["get"]["parameters"];
        assert_eq!(params[0]["name"], "id");
        assert_eq!(params[0]["in"], "path");
    }

    #[test]
    fn schemas_match_the_serialized_bodies() {
        let doc = document();
        let schemas = &doc["components"]["schemas"];

        let quote = serde_json::to_value(Quote::new(1, "a")).unwrap();
        assert_eq!(keys(&schemas["Quote"]["properties"]), keys(&quote));

        let record = serde_json::to_value(ErrorRecord {
            code: 404,
            message: "Not Found".to_owned(),
        })
        .unwrap();
        assert_eq!(keys(&schemas["ErrorRecord"]["properties"]), keys(&record));
    }

    #[test]
    fn spec_file_is_json() {
        let handler = DocsHandler::new("k");
        let res = handler.respond(&ctx_with_wildcard("/doc.json")).unwrap();
        assert!(res.headers().get("content-type").unwrap().starts_with("application/json"));
        let parsed: Value = serde_json::from_slice(res.payload()).unwrap();
        assert!(parsed["openapi"].as_str().unwrap().starts_with("3."));
    }

    #[test]
    fn anything_else_is_the_ui_page() {
        let handler = DocsHandler::new("k");
        let res = handler.respond(&ctx_with_wildcard("/index.html")).unwrap();
        assert!(res.headers().get("content-type").unwrap().starts_with("text/html"));
        let page = std::str::from_utf8(res.payload()).unwrap();
        assert!(page.contains(r#"url: "/swagger/doc.json""#));
        assert!(page.contains(r##"dom_id: "#swagger-ui""##));
    }
}
