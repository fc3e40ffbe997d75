//! A routed HTTP server demonstrating nested routes, path parameters,
//! middleware and custom fallbacks.

use std::time::Duration;

use log::info;
use microroute::{Cookie, HttpServer, Method, RouteDefinition, Router, ServerConfig, StatusCode};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize the logger
    env_logger::init();

    let config = ServerConfig {
        addr: "127.0.0.1:8081".parse()?,
        max_connections: 100,
        read_buffer_size: 4096,
        shutdown_timeout: Duration::from_secs(5),
    };

    let api = RouteDefinition::new("/api")
        .data(json!({"section": "api"}))
        .children([
            RouteDefinition::new("users")
                .key("users")
                .methods([Method::GET, Method::POST])
                .handler(|req, mut res| async move {
                    if req.method() == Method::POST {
                        res.status(StatusCode::Created);
                        return res.write_json(&json!({"created": true})).await;
                    }
                    res.write_json(&["ada", "grace", "linus"]).await
                }),
            RouteDefinition::new("users/{id}")
                .key("user")
                .handler(|req, res| async move {
                    let id = req.param("id").unwrap_or_default();
                    res.write_json(&json!({"id": id, "section": req.data})).await
                }),
            RouteDefinition::new("posts/{{tag}}")
                .key("posts")
                .handler(|req, res| async move {
                    let tag = req.param("tag").unwrap_or("all");
                    res.write_json(&json!({"tag": tag})).await
                }),
        ]);

    let router = Router::new()
        .route(RouteDefinition::new("/").handler(|_req, res| async move {
            res.write("<html><body><h1>Welcome to microroute!</h1></body></html>").await
        }))
        .route(RouteDefinition::new("/login").handler(|_req, mut res| async move {
            res.cookie(Cookie::new("session", "demo").http_only().max_age(3600));
            res.redirect("/api/users").await
        }))
        .route(api)
        // Requests to /api need a session cookie
        .middleware(|req, mut res, next| async move {
            if !req.path.starts_with("/api/") || req.cookie("session").is_some() {
                next.proceed(res);
                return Ok(());
            }
            next.handled();
            res.status(StatusCode::Unauthorized).header("Content-Type", "text/plain");
            res.write("Visit /login first").await
        })
        // Access log
        .middleware(|req, res, next| async move {
            info!(
                "{method} {path} from {ip}",
                method = req.method(),
                path = req.path,
                ip = req.client_ip().unwrap_or_else(|| "-".to_string())
            );
            next.proceed(res);
            Ok(())
        })
        .not_found(|req, mut res| async move {
            res.status(StatusCode::NotFound).header("Content-Type", "text/plain");
            res.write(format!("Nothing at {}", req.path)).await
        })
        .handshake_timeout(Duration::from_secs(10));

    let server = HttpServer::new(config, router)?;
    server.start().await?;

    Ok(())
}
