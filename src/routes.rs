use crate::{
    api::{payroll_entry, payroll_period, statutory_rules},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/periods")
                    // /periods
                    .service(
                        web::resource("")
                            .route(web::post().to(payroll_period::create_period))
                            .route(web::get().to(payroll_period::list_periods)),
                    )
                    // /periods/{period_id}
                    .service(
                        web::resource("/{period_id}")
                            .route(web::get().to(payroll_period::get_period)),
                    )
                    // lifecycle transitions
                    .service(
                        web::resource("/{period_id}/finalize")
                            .route(web::post().to(payroll_period::finalize_period)),
                    )
                    .service(
                        web::resource("/{period_id}/unfinalize")
                            .route(web::post().to(payroll_period::unfinalize_period)),
                    )
                    .service(
                        web::resource("/{period_id}/archive")
                            .route(web::post().to(payroll_period::archive_period)),
                    )
                    .service(
                        web::resource("/{period_id}/unarchive")
                            .route(web::post().to(payroll_period::unarchive_period)),
                    )
                    // batch run + roll-ups
                    .service(
                        web::resource("/{period_id}/generate")
                            .route(web::post().to(payroll_period::generate_payroll)),
                    )
                    .service(
                        web::resource("/{period_id}/summary")
                            .route(web::get().to(payroll_period::period_summary)),
                    )
                    .service(
                        web::resource("/{period_id}/export")
                            .route(web::get().to(payroll_period::export_period_csv)),
                    )
                    // /periods/{period_id}/entries
                    .service(
                        web::resource("/{period_id}/entries")
                            .route(web::post().to(payroll_entry::add_staff))
                            .route(web::get().to(payroll_entry::list_entries)),
                    )
                    .service(
                        web::resource("/{period_id}/entries/staff/{staff_id}")
                            .route(web::get().to(payroll_entry::entry_for_staff)),
                    ),
            )
            .service(
                web::scope("/entries")
                    // /entries/{entry_id}
                    .service(
                        web::resource("/{entry_id}")
                            .route(web::get().to(payroll_entry::get_entry))
                            .route(web::put().to(payroll_entry::update_entry)),
                    )
                    // payment toggles
                    .service(
                        web::resource("/{entry_id}/pay")
                            .route(web::post().to(payroll_entry::mark_paid)),
                    )
                    .service(
                        web::resource("/{entry_id}/unpay")
                            .route(web::post().to(payroll_entry::unmark_paid)),
                    ),
            )
            .service(
                web::scope("/rules")
                    // /rules
                    .service(
                        web::resource("")
                            .route(web::post().to(statutory_rules::publish_rules))
                            .route(web::get().to(statutory_rules::list_rules)),
                    )
                    // /rules/active
                    .service(
                        web::resource("/active")
                            .route(web::get().to(statutory_rules::get_active_rules)),
                    ),
            ),
    );
}
