use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/chain", web::get().to(handlers::get_chain))
            .route("/blocks/{index}", web::get().to(handlers::get_block))
            .route("/mine", web::post().to(handlers::mine_block))
            .route("/transactions/new", web::post().to(handlers::new_transaction))
            .route("/transactions/seal", web::post().to(handlers::seal_pending))
            .route("/transactions/pending", web::get().to(handlers::get_pending_transactions))
            .route("/transactions/address/{address}", web::get().to(handlers::get_address_history))
            .route("/balance/{address}", web::get().to(handlers::get_balance))
            .route("/accounts", web::get().to(handlers::get_all_accounts))
            .route("/validate", web::get().to(handlers::validate_chain))
    );
}
