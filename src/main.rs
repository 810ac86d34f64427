use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use hashledger::config::Config;
use hashledger::{api, blockchain};

// Open the persisted chain, or start a new one with a genesis block
fn initialize_blockchain(config: &Config) -> anyhow::Result<blockchain::Blockchain> {
    let data_dir = &config.storage.data_dir;

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    // a corrupted store is fatal: never fall back to an empty chain
    let blockchain = blockchain::Blockchain::with_storage(data_dir, config.chain)
        .with_context(|| format!("Failed to load blockchain from {}", data_dir.display()))?;

    info!(
        "Loaded blockchain from {} ({} blocks, difficulty {}, seal threshold {})",
        data_dir.display(),
        blockchain.len(),
        blockchain.difficulty(),
        blockchain.seal_threshold()
    );

    Ok(blockchain)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_block,
        api::handlers::mine_block,
        api::handlers::new_transaction,
        api::handlers::seal_pending,
        api::handlers::get_pending_transactions,
        api::handlers::get_address_history,
        api::handlers::get_balance,
        api::handlers::get_all_accounts,
        api::handlers::validate_chain
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::Address,
            blockchain::Account,
            blockchain::Violation,
            api::schema::ErrorResponse,
            api::handlers::ChainResponse,
            api::handlers::TransactionRequest,
            api::handlers::TransactionResponse,
            api::handlers::MineRequest,
            api::handlers::MineResponse,
            api::handlers::SealResponse,
            api::handlers::BalanceResponse,
            api::handlers::HistoryResponse,
            api::handlers::ValidationResponse
        )
    ),
    tags(
        (name = "ledger", description = "Ledger API endpoints")
    ),
    info(
        title = "Ledger API",
        version = "0.1.0",
        description = "A single-writer proof-of-work ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::load().context("Failed to load configuration")?;

    // Sealing runs on the blocking pool, so the engine is shared by handle
    let blockchain = web::Data::new(initialize_blockchain(&config)?);

    let bind_address = (config.server.host.clone(), config.server.port);
    info!("Starting HTTP server at http://{}:{}", bind_address.0, bind_address.1);

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(blockchain.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind(bind_address)
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server failed")
}
