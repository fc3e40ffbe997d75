//! Tests for the dispatcher and the HTTP server.

#[cfg(test)]
mod server_tests {
    use std::io::{self, Cursor};
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    use serde_json::json;

    use crate::parser::{parse_request, Error as ParserError, Method};
    use crate::router::{RouteDefinition, Router, RouterError};
    use crate::server::{Cookie, Dispatcher, Error, HttpServer, ServerConfig, StatusCode};

    // Mock TcpStream for testing
    struct MockTcpStream {
        read_data: Cursor<Vec<u8>>,
        write_data: Vec<u8>,
    }

    impl MockTcpStream {
        fn new(read_data: Vec<u8>) -> Self {
            Self {
                read_data: Cursor::new(read_data),
                write_data: Vec::new(),
            }
        }

        fn written_data(&self) -> &[u8] {
            &self.write_data
        }
    }

    impl AsyncRead for MockTcpStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let n = std::io::Read::read(&mut this.read_data, buf.initialize_unfilled())?;
            buf.advance(n);
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockTcpStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            this.write_data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Serve one raw request and return the handler result and the raw response.
    async fn serve(dispatcher: &Arc<Dispatcher>, request: &[u8]) -> (Result<(), Error>, String) {
        let mut stream = MockTcpStream::new(request.to_vec());
        let result = HttpServer::handle_connection(&mut stream, dispatcher.clone(), 1024, None).await;
        let response = String::from_utf8_lossy(stream.written_data()).into_owned();
        (result, response)
    }

    fn body_of(response: &str) -> &str {
        response.split_once("\r\n\r\n").map_or("", |(_, body)| body)
    }

    fn test_router() -> Router {
        Router::new().route(RouteDefinition::new("/test").handler(|_req, mut res| async move {
            res.header("Content-Type", "text/plain");
            res.write("Test response").await
        }))
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            addr: "127.0.0.1:8080".parse().unwrap(),
            max_connections: 100,
            read_buffer_size: 4096,
            shutdown_timeout: Duration::from_secs(5),
        };

        let server = HttpServer::new(config.clone(), test_router()).unwrap();
        assert_eq!(server.config.addr, config.addr);
        assert_eq!(server.config.max_connections, config.max_connections);
        assert_eq!(server.config.read_buffer_size, config.read_buffer_size);
        assert_eq!(server.config.shutdown_timeout, config.shutdown_timeout);
        assert_eq!(server.dispatcher.table().len(), 1);
    }

    #[tokio::test]
    async fn test_server_creation_fails_on_duplicate_handlers() {
        let router = test_router().route(
            RouteDefinition::new("test/").handler(|_req, res| async move { res.finish().await }),
        );

        match HttpServer::new(ServerConfig::default(), router) {
            Err(Error::RouteError(RouterError::DuplicateHandler { url })) => assert_eq!(url, "/test/"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("server created with conflicting handlers"),
        }
    }

    #[tokio::test]
    async fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr, "127.0.0.1:8080".parse::<std::net::SocketAddr>().unwrap());
        assert_eq!(config.max_connections, 1024);
        assert_eq!(config.read_buffer_size, 8192);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_handle_connection_with_valid_request() {
        let dispatcher = Arc::new(test_router().build().unwrap());
        let (result, response) = serve(&dispatcher, b"GET /test HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/plain\r\n"));
        assert!(response.contains("Content-Length: 13\r\n"));
        assert_eq!(body_of(&response), "Test response");
    }

    #[tokio::test]
    async fn test_handle_connection_with_pattern_route() {
        let router = Router::new().route(RouteDefinition::new("/users").child(
            RouteDefinition::new("{id}").handler(|req, res| async move {
                let id = req.param("id").unwrap_or("none").to_string();
                res.write(format!("user {id}")).await
            }),
        ));
        let dispatcher = Arc::new(router.build().unwrap());

        let (result, response) = serve(&dispatcher, b"GET /users/42?tab=posts HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert_eq!(body_of(&response), "user 42");
    }

    #[tokio::test]
    async fn test_encoded_unicode_segment_reaches_handler() {
        let router = Router::new().route(RouteDefinition::new("/users/{id}").handler(|req, res| async move {
            let body = format!("{} {}", req.path, req.param("id").unwrap_or("-"));
            res.write(body).await
        }));
        let dispatcher = Arc::new(router.build().unwrap());

        let (result, response) = serve(&dispatcher, b"GET /users/j%C3%BCrgen HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body_of(&response), "/users/j\u{fc}rgen/ j\u{fc}rgen");
    }

    #[tokio::test]
    async fn test_body_larger_than_read_buffer_gets_413() {
        let handler_ran = Arc::new(AtomicBool::new(false));
        let flag = handler_ran.clone();
        let router = Router::new().route(RouteDefinition::new("/upload").methods([Method::POST]).handler(
            move |req, res| {
                let flag = flag.clone();
                async move {
                    flag.store(true, Ordering::SeqCst);
                    res.write(format!("got {}", req.body().len())).await
                }
            },
        ));
        let dispatcher = Arc::new(router.build().unwrap());

        let mut request = b"POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 20000\r\n\r\n".to_vec();
        request.extend(std::iter::repeat(b'x').take(20000));
        let (result, response) = serve(&dispatcher, &request).await;

        assert!(matches!(result, Err(Error::PayloadTooLarge { limit: 1024 })));
        assert!(response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
        assert!(!handler_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_body_cut_short_by_peer_gets_400() {
        let dispatcher = Arc::new(test_router().build().unwrap());
        let request = b"POST /test HTTP/1.1\r\nHost: localhost\r\nContent-Length: 50\r\n\r\nonly ten b";
        let (result, response) = serve(&dispatcher, request).await;

        assert!(matches!(
            result,
            Err(Error::ParseError(ParserError::IncompleteBody { declared: 50, received: 10 }))
        ));
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn test_handle_connection_with_not_found() {
        let dispatcher = Arc::new(test_router().build().unwrap());
        let (result, response) = serve(&dispatcher, b"GET /nonexistent HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.contains("Content-Length: 0\r\n"));
        assert_eq!(body_of(&response), "");
    }

    #[tokio::test]
    async fn test_handle_connection_with_method_not_allowed() {
        let dispatcher = Arc::new(test_router().build().unwrap());
        let (result, response) = serve(&dispatcher, b"POST /test HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 403 Forbidden\r\n"));
        assert_eq!(body_of(&response), "");
    }

    #[tokio::test]
    async fn test_declared_route_without_handler_is_not_found() {
        let router = Router::new().route(
            RouteDefinition::new("/docs").child(
                RouteDefinition::new("intro").handler(|_req, res| async move { res.write("intro").await }),
            ),
        );
        let dispatcher = Arc::new(router.build().unwrap());

        let (_, response) = serve(&dispatcher, b"GET /docs HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));

        let (_, response) = serve(&dispatcher, b"GET /docs/intro HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn test_custom_fallback_hooks() {
        let router = test_router()
            .not_found(|req, mut res| async move {
                res.status(StatusCode::NotFound);
                res.write(format!("nothing at {}", req.path)).await
            })
            .method_not_allowed(|req, mut res| async move {
                res.status(StatusCode::MethodNotAllowed).header("Allow", "GET");
                res.write(format!("{} not allowed", req.method())).await
            });
        let dispatcher = Arc::new(router.build().unwrap());

        let (_, response) = serve(&dispatcher, b"GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert_eq!(body_of(&response), "nothing at /missing/");

        let (_, response) = serve(&dispatcher, b"DELETE /test HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(response.contains("Allow: GET\r\n"));
        assert_eq!(body_of(&response), "DELETE not allowed");
    }

    #[tokio::test]
    async fn test_handle_connection_with_invalid_request() {
        let dispatcher = Arc::new(test_router().build().unwrap());
        let (result, response) = serve(&dispatcher, b"INVALID REQUEST").await;

        assert!(matches!(result, Err(Error::ParseError(_))));
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.contains("Error parsing request:"));
    }

    #[tokio::test]
    async fn test_route_with_multiple_methods() {
        let router = Router::new().route(
            RouteDefinition::new("/multi")
                .methods([Method::GET, Method::POST])
                .handler(|req, mut res| async move {
                    match req.method() {
                        Method::POST => {
                            let payload: serde_json::Value = match req.json() {
                                Ok(payload) => payload,
                                Err(e) => return Err(Error::InternalError(e.to_string())),
                            };
                            res.status(StatusCode::Created);
                            res.write_json(&json!({"received": payload["name"]})).await
                        }
                        _ => res.write("GET response").await,
                    }
                }),
        );
        let dispatcher = Arc::new(router.build().unwrap());

        let (_, response) = serve(&dispatcher, b"GET /multi HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body_of(&response), "GET response");

        let post = b"POST /multi HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 15\r\n\r\n{\"name\":\"ada\"}\n";
        let (_, response) = serve(&dispatcher, post).await;
        assert!(response.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(response.contains("Content-Type: application/json; charset=utf-8\r\n"));
        assert_eq!(body_of(&response), r#"{"received":"ada"}"#);

        let (_, response) = serve(&dispatcher, b"PUT /multi HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 403 Forbidden\r\n"));
    }

    #[tokio::test]
    async fn test_headers_cookies_and_default_status() {
        let router = Router::new().route(RouteDefinition::new("/login").handler(|_req, mut res| async move {
            res.header("X-Trace", "abc")
                .cookie(Cookie::new("session", "s1").http_only())
                .cookie(Cookie::new("theme", "dark").max_age(60));
            res.write("welcome").await
        }));
        let dispatcher = Arc::new(router.build().unwrap());

        let (_, response) = serve(&dispatcher, b"GET /login HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("X-Trace: abc\r\n"));
        assert!(response.contains("Set-Cookie: session=s1; Path=/; HttpOnly\r\n"));
        assert!(response.contains("Set-Cookie: theme=dark; Path=/; Max-Age=60\r\n"));
    }

    #[tokio::test]
    async fn test_handler_sees_route_data_and_request_details() {
        let router = Router::new().route(
            RouteDefinition::new("/admin/{section}")
                .key("admin")
                .data(json!({"role": "admin"}))
                .handler(|req, res| async move {
                    let role = req.data.as_ref().and_then(|d| d["role"].as_str()).unwrap_or("-").to_string();
                    let body = format!(
                        "{}|{}|{}|{}|{}",
                        req.route.as_ref().map(ToString::to_string).unwrap_or_default(),
                        role,
                        req.param("section").unwrap_or("-"),
                        req.query("page").unwrap_or("-"),
                        req.cookie("token").unwrap_or("-"),
                    );
                    res.write(body).await
                }),
        );
        let dispatcher = Arc::new(router.build().unwrap());

        let request = b"GET /admin/users?page=3 HTTP/1.1\r\nHost: localhost\r\nCookie: token=t0k; lang=en\r\n\r\n";
        let (_, response) = serve(&dispatcher, request).await;
        assert_eq!(body_of(&response), "admin|admin|users|3|t0k");
    }

    #[tokio::test]
    async fn test_middleware_short_circuit_skips_handler() {
        let handler_ran = Arc::new(AtomicBool::new(false));
        let flag = handler_ran.clone();

        let router = Router::new()
            .route(RouteDefinition::new("/private").handler(move |_req, res| {
                let flag = flag.clone();
                async move {
                    flag.store(true, Ordering::SeqCst);
                    res.write("secret").await
                }
            }))
            .middleware(|req, mut res, next| async move {
                if req.cookie("session").is_some() {
                    next.proceed(res);
                    return Ok(());
                }
                next.handled();
                res.status(StatusCode::Unauthorized);
                res.write("login required").await
            });
        let dispatcher = Arc::new(router.build().unwrap());

        let (_, response) = serve(&dispatcher, b"GET /private HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
        assert_eq!(body_of(&response), "login required");
        assert!(!handler_ran.load(Ordering::SeqCst));

        let (_, response) = serve(&dispatcher, b"GET /private HTTP/1.1\r\nHost: localhost\r\nCookie: session=1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body_of(&response), "secret");
        assert!(handler_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_middlewares_run_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (first, second, handler) = (order.clone(), order.clone(), order.clone());

        let router = Router::new()
            .route(RouteDefinition::new("/").handler(move |_req, res| {
                let handler = handler.clone();
                async move {
                    handler.lock().unwrap().push("handler");
                    res.write("home").await
                }
            }))
            .middleware(move |_req, mut res, next| {
                let first = first.clone();
                async move {
                    first.lock().unwrap().push("first");
                    res.header("X-First", "1");
                    next.proceed(res);
                    Ok(())
                }
            })
            .middleware(move |_req, mut res, next| {
                let second = second.clone();
                async move {
                    second.lock().unwrap().push("second");
                    assert_eq!(res.state().header("X-First"), Some("1"));
                    res.header("X-Second", "2");
                    next.proceed(res);
                    Ok(())
                }
            });
        let dispatcher = Arc::new(router.build().unwrap());

        let (_, response) = serve(&dispatcher, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.contains("X-First: 1\r\n"));
        assert!(response.contains("X-Second: 2\r\n"));
        assert_eq!(body_of(&response), "home");
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "handler"]);
    }

    #[tokio::test]
    async fn test_middleware_runs_for_unmatched_paths() {
        let router = Router::new().middleware(|_req, mut res, next| async move {
            res.header("X-Seen", "yes");
            next.proceed(res);
            Ok(())
        });
        let dispatcher = Arc::new(router.build().unwrap());

        let (_, response) = serve(&dispatcher, b"GET /anything HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.contains("X-Seen: yes\r\n"));
    }

    #[tokio::test]
    async fn test_middleware_writing_without_signal_short_circuits() {
        let handler_ran = Arc::new(AtomicBool::new(false));
        let flag = handler_ran.clone();

        let router = Router::new()
            .route(RouteDefinition::new("/").handler(move |_req, res| {
                let flag = flag.clone();
                async move {
                    flag.store(true, Ordering::SeqCst);
                    res.finish().await
                }
            }))
            .middleware(|_req, mut res, next| async move {
                // Holds on to `next` until after the write.
                res.status(StatusCode::TooManyRequests);
                let written = res.write("slow down").await;
                drop(next);
                written
            });
        let dispatcher = Arc::new(router.build().unwrap());

        let (_, response) = serve(&dispatcher, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 429 Too Many Requests\r\n"));
        assert_eq!(body_of(&response), "slow down");
        assert!(!handler_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dropped_writer_yields_internal_error() {
        let router = Router::new()
            .route(RouteDefinition::new("/broken").handler(|_req, res| async move {
                drop(res);
                Err(Error::InternalError("gave up".to_string()))
            }))
            .route(RouteDefinition::new("/guarded").handler(|_req, res| async move { res.finish().await }))
            .middleware(|req, res, next| async move {
                if req.path == "/guarded/" {
                    // Neither proceeds nor writes.
                    drop((res, next));
                    return Ok(());
                }
                next.proceed(res);
                Ok(())
            });
        let dispatcher = Arc::new(router.build().unwrap());

        let (_, response) = serve(&dispatcher, b"GET /broken HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));

        let (_, response) = serve(&dispatcher, b"GET /guarded HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[tokio::test]
    async fn test_handshake_timeout_yields_gateway_timeout() {
        let router = Router::new()
            .route(RouteDefinition::new("/stuck").handler(|_req, res| async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                res.finish().await
            }))
            .handshake_timeout(Duration::from_millis(50));
        let dispatcher = Arc::new(router.build().unwrap());

        let (result, response) = serve(&dispatcher, b"GET /stuck HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 504 Gateway Timeout\r\n"));
    }

    #[tokio::test]
    async fn test_write_returns_only_after_acknowledge() {
        let (done_tx, mut done_rx) = oneshot::channel();
        let done_tx = Arc::new(Mutex::new(Some(done_tx)));

        let router = Router::new().route(RouteDefinition::new("/").handler(move |_req, res| {
            let done_tx = done_tx.clone();
            async move {
                let result = res.write("ok").await;
                if let Some(tx) = done_tx.lock().unwrap().take() {
                    let _ = tx.send(result.is_ok());
                }
                Ok(())
            }
        }));
        let dispatcher = router.build().unwrap();

        let request = parse_request(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
        let reply = dispatcher.dispatch(request, None).await;
        assert_eq!(reply.response.status, StatusCode::Ok);
        assert_eq!(reply.response.body, b"ok".to_vec());
        assert!(done_rx.try_recv().is_err());

        reply.acknowledge();
        assert_eq!(done_rx.await, Ok(true));
    }

    #[tokio::test]
    async fn test_dropped_reply_fails_the_write() {
        let (done_tx, done_rx) = oneshot::channel();
        let done_tx = Arc::new(Mutex::new(Some(done_tx)));

        let router = Router::new().route(RouteDefinition::new("/").handler(move |_req, res| {
            let done_tx = done_tx.clone();
            async move {
                let result = res.write("lost").await;
                if let Some(tx) = done_tx.lock().unwrap().take() {
                    let _ = tx.send(matches!(result, Err(Error::ResponseDropped)));
                }
                Ok(())
            }
        }));
        let dispatcher = router.build().unwrap();

        let request = parse_request(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
        drop(dispatcher.dispatch(request, None).await);
        assert_eq!(done_rx.await, Ok(true));
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_isolated() {
        let router = Router::new().route(RouteDefinition::new("/echo/{word}").handler(|req, res| async move {
            let word = req.param("word").unwrap_or_default().to_string();
            tokio::time::sleep(Duration::from_millis(5)).await;
            res.write(word).await
        }));
        let dispatcher = Arc::new(router.build().unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let dispatcher = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                let request = format!("GET /echo/w{i} HTTP/1.1\r\nHost: localhost\r\n\r\n");
                let (_, response) = serve(&dispatcher, request.as_bytes()).await;
                (i, body_of(&response).to_string())
            }));
        }

        for handle in handles {
            let (i, body) = handle.await.unwrap();
            assert_eq!(body, format!("w{i}"));
        }
    }

    async fn round_trip(addr: std::net::SocketAddr, request: &[u8]) -> String {
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(request).await.unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    #[tokio::test]
    async fn test_serve_over_tcp_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = ServerConfig { addr, ..ServerConfig::default() };
        let server = Arc::new(HttpServer::new(config, test_router()).unwrap());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let running = tokio::spawn({
            let server = server.clone();
            async move {
                server
                    .serve(listener, async {
                        let _ = shutdown_rx.await;
                    })
                    .await
            }
        });

        let response = round_trip(addr, b"GET /test HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body_of(&response), "Test response");

        let response = round_trip(addr, b"GET /other HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));

        shutdown_tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), running).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    #[tokio::test]
    async fn test_connections_over_the_limit_get_503() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = ServerConfig {
            addr,
            max_connections: 0,
            ..ServerConfig::default()
        };
        let server = Arc::new(HttpServer::new(config, test_router()).unwrap());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let running = tokio::spawn({
            let server = server.clone();
            async move {
                server
                    .serve(listener, async {
                        let _ = shutdown_rx.await;
                    })
                    .await
            }
        });

        // Rejected before anything is read, so the client sends nothing.
        let response = round_trip(addr, b"").await;
        assert!(response.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(response.contains("Content-Type: text/plain\r\n"));
        assert_eq!(body_of(&response), "Server is at capacity, please try again later");

        shutdown_tx.send(()).unwrap();
        running.await.unwrap().unwrap();
    }
}
