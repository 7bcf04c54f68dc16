//! 自然语言查询服务
//!
//! 将自然语言问题交给 SQL 智能体，在基金数据库上生成并执行查询：
//! - 每个请求独立建立数据库连接
//! - 智能体通过工具集查看表结构并执行 SQL
//! - 返回模型给出的最终答案

mod agent;
mod database;
mod handlers;
mod llm;
mod prompts;
mod routes;
mod service;
mod state;
mod toolkit;

#[cfg(test)]
mod testing;

use axum::{middleware, routing::get, Json, Router};
use common::config::AppConfig;
use common::middleware::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "query-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "查询服务 API",
        version = "0.1.0",
        description = "基金数据自然语言查询服务"
    ),
    paths(
        handlers::run_query,
        handlers::health_check,
    ),
    components(schemas(
        handlers::HealthResponse,
    )),
    tags(
        (name = "query", description = "自然语言查询端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME);
    info!(database = ?config.database, llm = ?config.llm, agent = ?config.agent, "配置已加载");
    if config.llm.api_key.is_none() {
        warn!("未设置 OPENAI_API_KEY，查询请求将失败");
    }

    // 创建应用状态
    let addr = config.bind_address();
    let state = AppState::new(config)?;

    // 创建路由
    let app = create_router(state);

    // 启动服务
    info!(service = SERVICE_NAME, address = %addr, "启动服务");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(service = SERVICE_NAME, "服务已停止");
    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "无法监听关闭信号");
        std::future::pending::<()>().await;
    }
    info!("收到关闭信号");
}
