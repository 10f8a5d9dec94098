use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::PgPool;
use std::io;
use std::sync::Arc;

use task_tracker::auth::{
    AlphanumericGenerator, AuthenticationService, AuthorizationService, BlockingPolicy,
    SessionLifetimes, TokenCodec, TokenPolicy, VerificationLifetimes, VerificationService,
};
use task_tracker::cache::{InMemoryCache, RedisCache, SessionCache, VerificationCache};
use task_tracker::config::Config;
use task_tracker::mailer::{LogMailer, Mailer};
use task_tracker::routes::{self, health};
use task_tracker::users::{PgUserStore, UserStore};

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    let pool = PgPool::connect(&config.database_url)
        .await
        .map_err(|e| startup_error("Failed to connect to database", e))?;
    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| startup_error("Failed to run migrations", e))?;

    let session_cache: Arc<dyn SessionCache>;
    let verification_cache: Arc<dyn VerificationCache>;
    match &config.redis_url {
        Some(url) => {
            let cache = Arc::new(
                RedisCache::connect(url, config.cache_timeout)
                    .await
                    .map_err(|e| startup_error("Failed to connect to Redis", e))?,
            );
            log::info!("Using Redis session cache");
            session_cache = cache.clone();
            verification_cache = cache;
        }
        None => {
            log::warn!("REDIS_URL is not set; sessions are kept in process memory");
            let cache = Arc::new(InMemoryCache::new());
            session_cache = cache.clone();
            verification_cache = cache;
        }
    }

    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);

    let authorization = web::Data::new(AuthorizationService::new(
        TokenCodec::new(config.jwt.signing_key.clone()),
        session_cache.clone(),
        SessionLifetimes {
            access_token: config.jwt.access_token_lifetime,
            refresh_token: config.jwt.refresh_token_lifetime,
        },
    ));
    let authentication = web::Data::new(AuthenticationService::new(
        users.clone(),
        session_cache,
        BlockingPolicy {
            max_errors: config.user_blocking.max_errors,
            lifetime: config.user_blocking.lifetime,
        },
    ));
    let verification = web::Data::new(VerificationService::new(
        verification_cache,
        Arc::new(AlphanumericGenerator),
        TokenPolicy::default(),
        VerificationLifetimes {
            email_confirm: config.verification.email_confirm_token_lifetime,
            password_reset: config.verification.password_reset_token_lifetime,
        },
    ));
    let users: web::Data<dyn UserStore> = web::Data::from(users);
    let mailer: web::Data<dyn Mailer> = web::Data::from(mailer);

    log::info!("Starting task tracker server at {}", config.server_url());
    HttpServer::new(move || {
        App::new()
            .app_data(authorization.clone())
            .app_data(authentication.clone())
            .app_data(verification.clone())
            .app_data(users.clone())
            .app_data(mailer.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(health::health)
            .service(web::scope("/api").configure(routes::config))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
