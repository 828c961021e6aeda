use crate::{
    api::{
        appointments, clients, clinics, device_results, devices,
        hr::{attendance, employees, location, me, reports as hr_reports, webauthn},
        invoices, patients, reports, users,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Per-route limiter. The builder only refuses a zero period or burst,
// both of which are clamped away here.
fn build_limiter(requests_per_min: u32) -> Option<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let burst = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(burst)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(burst)
        .key_extractor(PeerIpKeyExtractor)
        .finish()?;
    Some(Governor::new(&cfg))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let (Some(login_limiter), Some(refresh_limiter), Some(protected_limiter)) = (
        build_limiter(config.rate_login_per_min),
        build_limiter(config.rate_refresh_per_min),
        build_limiter(config.rate_protected_per_min),
    ) else {
        tracing::error!("Rate limiter configuration rejected; routes not mounted");
        return;
    };
    let login_limiter = Arc::new(login_limiter);
    let refresh_limiter = Arc::new(refresh_limiter);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/hr/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::hr_login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Login pages resolve the tenant before anyone is signed in
    cfg.service(
        web::resource("/clients/by-slug/{slug}")
            .wrap(login_limiter.clone())
            .route(web::get().to(clients::get_by_slug)),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::scope("/clients")
                    .service(
                        web::resource("")
                            .route(web::get().to(clients::list_clients))
                            .route(web::post().to(clients::create_client)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(clients::get_client))
                            .route(web::patch().to(clients::update_client))
                            .route(web::delete().to(clients::delete_client)),
                    )
                    .route("/{id}/owner", web::post().to(clients::create_owner))
                    .route("/{id}/extend-trial", web::post().to(clients::extend_trial))
                    .route("/{id}/trial-end-date", web::put().to(clients::set_trial_end_date))
                    .route(
                        "/{id}/extend-subscription",
                        web::post().to(clients::extend_subscription),
                    )
                    .route("/{id}/suspend", web::post().to(clients::suspend_client))
                    .route("/{id}/activate", web::post().to(clients::activate_client))
                    .route("/{id}/features", web::put().to(clients::set_features))
                    .route("/{id}/stats", web::get().to(clients::client_stats)),
            )
            .service(
                web::resource("/clinics")
                    .route(web::get().to(clinics::list_clinics))
                    .route(web::post().to(clinics::create_clinic)),
            )
            .service(
                web::resource("/users")
                    .route(web::get().to(users::list_users))
                    .route(web::post().to(users::create_user)),
            )
            .service(
                web::scope("/patients")
                    .service(
                        web::resource("")
                            .route(web::get().to(patients::list_patients))
                            .route(web::post().to(patients::create_patient)),
                    )
                    .route("/{id}", web::get().to(patients::get_patient)),
            )
            .service(
                web::scope("/appointments")
                    .route("", web::post().to(appointments::create_appointment))
                    .route("/today", web::get().to(appointments::today))
                    .route("/week", web::get().to(appointments::week))
                    .route("/day", web::get().to(appointments::day))
                    .route("/{id}/status", web::patch().to(appointments::update_status)),
            )
            .service(
                web::scope("/invoices")
                    .service(
                        web::resource("")
                            .route(web::get().to(invoices::list_invoices))
                            .route(web::post().to(invoices::create_invoice)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(invoices::update_invoice))
                            .route(web::delete().to(invoices::delete_invoice)),
                    ),
            )
            .service(
                web::scope("/devices")
                    .service(
                        web::resource("")
                            .route(web::get().to(devices::list_devices))
                            .route(web::post().to(devices::create_device)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(devices::update_device))
                            .route(web::delete().to(devices::delete_device)),
                    )
                    .route("/{id}/last-seen", web::put().to(devices::touch_last_seen)),
            )
            .service(
                web::scope("/device-results")
                    .service(
                        web::resource("")
                            .route(web::get().to(device_results::list_results))
                            .route(web::post().to(device_results::submit_result)),
                    )
                    .route("/pending-count", web::get().to(device_results::pending_count))
                    .route("/{id}/match", web::put().to(device_results::match_result))
                    .route("/{id}/reject", web::put().to(device_results::reject_result)),
            )
            .service(
                web::scope("/reports")
                    .route("/doctor-load", web::get().to(reports::doctor_load))
                    .route("/cancellations", web::get().to(reports::cancellations))
                    .route("/peak-hours", web::get().to(reports::peak_hours)),
            )
            .service(
                web::scope("/hr")
                    .service(
                        web::resource("/clinic/location")
                            .route(web::get().to(location::list_locations))
                            .route(web::patch().to(location::update_location)),
                    )
                    .service(
                        web::scope("/employees")
                            .service(
                                web::resource("")
                                    .route(web::get().to(employees::list_employees))
                                    .route(web::post().to(employees::create_employee)),
                            )
                            // must precede /{id}
                            .route(
                                "/username-available",
                                web::get().to(employees::username_available),
                            )
                            .service(
                                web::resource("/{id}")
                                    .route(web::put().to(employees::update_employee))
                                    .route(web::delete().to(employees::deactivate_employee)),
                            )
                            .route(
                                "/{id}/reset-password",
                                web::post().to(employees::reset_password),
                            ),
                    )
                    .route("/me", web::get().to(me::get_me))
                    .service(
                        web::scope("/webauthn")
                            .route("/register/options", web::post().to(webauthn::register_options))
                            .route("/register/verify", web::post().to(webauthn::register_verify))
                            .route(
                                "/authenticate/options",
                                web::post().to(webauthn::authenticate_options),
                            )
                            .route(
                                "/authenticate/verify",
                                web::post().to(webauthn::authenticate_verify),
                            ),
                    )
                    .service(
                        web::scope("/attendance")
                            .route("", web::get().to(attendance::list_attendance))
                            .route("/check-in", web::post().to(attendance::check_in))
                            .route("/check-out", web::post().to(attendance::check_out)),
                    )
                    .service(
                        web::scope("/reports")
                            .route("/monthly", web::get().to(hr_reports::monthly))
                            .route("/my-monthly", web::get().to(hr_reports::my_monthly)),
                    ),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_accepts_zero_rate() {
        assert!(build_limiter(0).is_some());
        assert!(build_limiter(60).is_some());
        assert!(build_limiter(100_000).is_some());
    }
}
