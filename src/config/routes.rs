use super::init::AppState;
use crate::{
    middleware::{auth_login::auth_login, token_decode::token_decode},
    service::{
        message_service, module_service, notification_service, post_service,
        subscription_service, ticket_service,
    },
};
use axum::{
    routing::{delete, get, post, put},
    AddExtensionLayer, Router,
};
use axum_extra::middleware::from_fn;
use std::sync::Arc;

fn post_routes() -> Router {
    Router::new()
        .route("/list", get(post_service::list_posts))
        .route("/get/:id", get(post_service::get_post))
        .route("/comments/:id", get(post_service::get_comments))
        .route("/by_user/:uid", get(post_service::posts_of_user))
        .route("/comments_by_user/:uid", get(post_service::comments_of_user))
        .route("/in_module/:mid", get(post_service::posts_in_module))
        .route("/search", get(post_service::search_posts))
        .merge(
            Router::new()
                .route("/liked", get(post_service::liked_posts))
                .route("/create", post(post_service::create_post))
                .route("/update/:id", put(post_service::update_post))
                .route("/delete/:id", delete(post_service::delete_post))
                .route("/like/:id", post(post_service::toggle_like))
                .route_layer(from_fn(auth_login)),
        )
}

fn subscription_routes() -> Router {
    Router::new()
        .route("/list", get(subscription_service::my_subscriptions))
        .route("/type/:kind", get(subscription_service::my_subscriptions_by_type))
        .route("/check/:kind/:id", get(subscription_service::check))
        .route("/subscribe", post(subscription_service::subscribe))
        .route("/remove/:kind/:id", delete(subscription_service::unsubscribe))
        .route("/subscribers/:kind/:id", get(subscription_service::subscribers))
        .route_layer(from_fn(auth_login))
}

fn notification_routes() -> Router {
    Router::new()
        .route("/list", get(notification_service::list))
        .route("/count", get(notification_service::unread_count))
        .route("/read/:id", put(notification_service::mark_read))
        .route("/read_all", put(notification_service::mark_all_read))
        .route("/delete/:id", delete(notification_service::delete))
        .route("/delete_read", delete(notification_service::delete_read))
        .route_layer(from_fn(auth_login))
}

fn ticket_routes() -> Router {
    Router::new()
        .route("/create", post(ticket_service::create_ticket))
        .route("/create_with_file", post(ticket_service::create_ticket_with_file))
        .route("/get/:id", get(ticket_service::get_ticket))
        .route("/list", get(ticket_service::list_tickets))
        .route("/open", get(ticket_service::list_open))
        .route("/student/:id", get(ticket_service::list_for_student))
        .route("/tutor/:id", get(ticket_service::list_for_tutor))
        .route("/claim/:id", post(ticket_service::claim))
        .route("/respond/:id", post(ticket_service::respond))
        .route_layer(from_fn(auth_login))
}

fn message_routes() -> Router {
    Router::new()
        .route("/conversations", get(message_service::conversations))
        .route("/with/:uid", get(message_service::with_user))
        .route("/send", post(message_service::send))
        .route("/read/:id", put(message_service::mark_read))
        .route("/unread_count", get(message_service::unread_count))
        .route_layer(from_fn(auth_login))
}

fn module_routes() -> Router {
    Router::new()
        .route("/list", get(module_service::list_modules))
        .route("/get/:id", get(module_service::get_module))
        .merge(
            Router::new()
                .route("/create", post(module_service::create_module))
                .route_layer(from_fn(auth_login)),
        )
}

fn material_routes() -> Router {
    Router::new()
        .route("/info/:id", get(module_service::material_info))
        .route("/download/:id", get(module_service::download_material))
        .route_layer(from_fn(auth_login))
}

/// Every route under `/api`. Tokens are decoded for all of them; the login gate only
/// guards the routes that need a caller.
pub fn config_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .nest("/posts", post_routes())
                .nest("/subscriptions", subscription_routes())
                .nest("/notifications", notification_routes())
                .nest("/tickets", ticket_routes())
                .nest("/messages", message_routes())
                .nest("/modules", module_routes())
                .nest("/materials", material_routes()),
        )
        .route_layer(from_fn(token_decode))
        .layer(AddExtensionLayer::new(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::fixtures::Fixture;
    use crate::model::{
        post::NewPost,
        ticket::NewTicket,
        user::AccessLevel,
    };
    use crate::utils::jwt::TokenCodec;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::Value as Json;
    use tower::ServiceExt;

    fn bearer(user_id: i64) -> String {
        format!("Bearer {}", TokenCodec::new("test-secret", 3600).issue(user_id))
    }

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, Json) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Json::Null))
    }

    fn get_req(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, t);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn json_req(method: Method, uri: &str, token: &str, body: Json) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn public_reads_and_login_gate() {
        let fx = Fixture::new();
        let tutor = fx.user("Tia", AccessLevel::Tutor);
        let module = fx.module("Databases").await;
        fx.topic(tutor.user_id, "Normal forms", Some(module.module_id)).await;
        let app = config_routes(Arc::new(fx.state));

        let (status, body) = call(app.clone(), get_req("/api/posts/list", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["msg"], "ok");
        assert_eq!(body["data"].as_array().map(|a| a.len()), Some(1));

        let (status, _) = call(app.clone(), get_req("/api/notifications/list", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            app.clone(),
            get_req("/api/notifications/list", Some("Bearer not-a-token")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(app, get_req("/api/posts/get/999", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ticket_flow_over_http() {
        let fx = Fixture::new();
        let student = fx.user("Sam", AccessLevel::Student);
        let tutor = fx.user("Tia", AccessLevel::Tutor);
        let rival = fx.user("Rex", AccessLevel::Tutor);
        let module = fx.module("Networks").await;
        let app = config_routes(Arc::new(fx.state));

        let (status, body) = call(
            app.clone(),
            json_req(
                Method::POST,
                "/api/tickets/create",
                &bearer(student.user_id),
                serde_json::json!({"title": "Subnetting", "content": "How do /27 masks work?", "module_id": module.module_id}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let ticket_id = body["data"]["ticket_id"].as_i64().unwrap();

        let claim = format!("/api/tickets/claim/{}", ticket_id);
        let (status, _) = call(
            app.clone(),
            json_req(Method::POST, &claim, &bearer(student.user_id), Json::Null),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            app.clone(),
            json_req(Method::POST, &claim, &bearer(tutor.user_id), Json::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status_name"], "Received");

        let (status, body) = call(
            app.clone(),
            json_req(Method::POST, &claim, &bearer(rival.user_id), Json::Null),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "ticket is already claimed by another tutor");

        let respond = format!("/api/tickets/respond/{}", ticket_id);
        let (status, body) = call(
            app.clone(),
            json_req(
                Method::POST,
                &respond,
                &bearer(tutor.user_id),
                serde_json::json!({"content": "Count the host bits."}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["response_content"], "Count the host bits.");

        let (status, body) = call(
            app,
            get_req("/api/notifications/count", Some(&bearer(student.user_id))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], 1);
    }

    #[tokio::test]
    async fn role_checks_on_posts() {
        let fx = Fixture::new();
        let student = fx.user("Sam", AccessLevel::Student);
        let admin = fx.user("Ada", AccessLevel::Admin);
        let post = fx
            .state
            .posts
            .create(student.user_id, NewPost::post("Lost notes", "Anyone?", None))
            .await
            .unwrap();
        let app = config_routes(Arc::new(fx.state));

        let (status, _) = call(
            app.clone(),
            json_req(
                Method::POST,
                "/api/posts/create",
                &bearer(student.user_id),
                serde_json::json!({"type": 3, "title": "My topic", "content": "text"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = format!("/api/posts/delete/{}", post.post_id);
        let (status, _) = call(
            app.clone(),
            json_req(Method::DELETE, &uri, &bearer(student.user_id), Json::Null),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            app,
            json_req(Method::DELETE, &uri, &bearer(admin.user_id), Json::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn students_cannot_read_other_tickets() {
        let fx = Fixture::new();
        let owner = fx.user("Sam", AccessLevel::Student);
        let other = fx.user("Ola", AccessLevel::Student);
        let module = fx.module("Networks").await;
        let view = fx
            .state
            .tickets
            .create(
                owner.user_id,
                NewTicket {
                    title: "Routing".to_string(),
                    content: "What is OSPF?".to_string(),
                    module_id: module.module_id,
                },
                None,
            )
            .await
            .unwrap();
        let app = config_routes(Arc::new(fx.state));
        let uri = format!("/api/tickets/get/{}", view.ticket_id);

        let (status, _) = call(app.clone(), get_req(&uri, Some(&bearer(other.user_id)))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = call(app, get_req(&uri, Some(&bearer(owner.user_id)))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["title"], "Routing");
    }
}
