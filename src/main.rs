use std::{process, sync::Arc};

use tokio::{net::TcpListener, sync::Notify};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        auth::UserTokenService,
        error::AppError,
        feed::FeedService,
        follow::FollowService,
        groups::{CreateGroupCommand, GroupService},
        pagination::Paginator,
        posts::PostService,
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, HealthRepo, PostsRepo, PostsWriteRepo,
            TokensRepo, UsersRepo,
        },
        users::UserService,
    },
    cache::{CacheConfig, ResponseCache},
    config::{self, GroupsCommand, UsersCommand},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        uploads::MediaStorage,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Users(args) => run_users(settings, args.command).await,
        config::Command::Groups(args) => run_groups(settings, args.command).await,
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::Migration(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let tokens_repo: Arc<dyn TokensRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let media = Arc::new(
        MediaStorage::new(settings.media.root.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    let follows = FollowService::new(users_repo.clone(), follows_repo);
    let feed = FeedService::new(
        posts_repo.clone(),
        groups_repo.clone(),
        users_repo.clone(),
        comments_repo.clone(),
        follows.clone(),
        Paginator::new(settings.feed.page_size.get()),
    );
    let posts = PostService::new(
        posts_repo,
        posts_write_repo,
        groups_repo,
        comments_repo,
        media.clone(),
    );
    let tokens = UserTokenService::new(users_repo, tokens_repo);
    let cache = Arc::new(ResponseCache::new(CacheConfig::from(&settings.cache)));

    let max_request_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::from(InfraError::configuration("upload limit exceeds usize")))?;

    Ok(HttpState {
        feed: Arc::new(feed),
        follows: Arc::new(follows),
        posts: Arc::new(posts),
        tokens: Arc::new(tokens),
        media,
        health: health_repo,
        cache,
        login_url: Arc::from(settings.auth.login_url.as_str()),
        max_request_bytes,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings)?;
    let router = http::build_router(state);

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "yatube::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let shutdown = Arc::new(Notify::new());
    let signalled = shutdown.clone();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            signalled.notify_one();
        },
    );
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return finish_server(joined),
        _ = shutdown.notified() => {}
    }

    info!(target = "yatube::serve", "shutting down");
    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(joined) => finish_server(joined),
        Err(_) => {
            warn!(
                target = "yatube::serve",
                grace_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

fn finish_server(
    joined: Result<Result<(), std::io::Error>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "yatube::serve",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}

async fn run_users(settings: config::Settings, command: UsersCommand) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let tokens_repo: Arc<dyn TokensRepo> = repositories;
    let users = UserService::new(users_repo.clone());
    let tokens = UserTokenService::new(users_repo, tokens_repo);

    match command {
        UsersCommand::Create { username } => {
            let user = users.create_user(&username).await?;
            let issued = tokens.issue(&user.username).await?;
            println!("created user {} ({})", user.username, user.id);
            println!("token: {}", issued.token);
        }
        UsersCommand::Delete { username } => {
            let user = users.delete_user(&username).await?;
            println!("deleted user {} ({})", user.username, user.id);
        }
        UsersCommand::Token { username } => {
            let issued = tokens.issue(&username).await?;
            println!("token for {}: {}", issued.user.username, issued.token);
        }
    }
    Ok(())
}

async fn run_groups(settings: config::Settings, command: GroupsCommand) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let groups_repo: Arc<dyn GroupsRepo> = repositories;
    let groups = GroupService::new(groups_repo);

    match command {
        GroupsCommand::Create {
            title,
            slug,
            description,
        } => {
            let group = groups
                .create_group(CreateGroupCommand {
                    title,
                    slug,
                    description,
                })
                .await?;
            println!("created group {} ({})", group.slug, group.id);
        }
        GroupsCommand::Delete { slug } => {
            let group = groups.delete_group(&slug).await?;
            println!("deleted group {}; its posts no longer have a group", group.slug);
        }
    }
    Ok(())
}
