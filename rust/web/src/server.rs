use crate::events::EventBus;
use crate::handlers;
use crate::middleware::with_request_logging;
use crate::service::GameService;
use crate::settings::AppSettings;
use crate::store::InMemoryGameStore;
use gotg_engine::logger::GameLogger;
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::filters::BoxedFilter;
use warp::reply::{Reply, Response};
use warp::Filter;

const PLAYER_HEADER: &str = "x-player-id";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: String,
    port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn for_tests() -> Self {
        Self::new("127.0.0.1", 0)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[derive(Debug, Clone)]
pub struct AppContext {
    config: ServerConfig,
    settings: AppSettings,
    event_bus: Arc<EventBus>,
    games: Arc<GameService>,
}

impl AppContext {
    /// Wires the in-memory store, the event bus and the optional archive
    /// from `settings`.
    pub fn new(config: ServerConfig, settings: AppSettings) -> Result<Self, ServerError> {
        settings
            .validate()
            .map_err(|err| ServerError::ConfigError(err.to_string()))?;

        let event_bus = Arc::new(EventBus::with_capacity(settings.event_channel_capacity));
        let mut games = GameService::new(Arc::new(InMemoryGameStore::new()), Arc::clone(&event_bus))
            .with_retry_policy(settings.retry_policy())
            .with_time_budget_ms(settings.time_budget_ms());
        if let Some(path) = &settings.archive_path {
            let logger = GameLogger::create(path).map_err(|err| {
                ServerError::ConfigError(format!("cannot open archive {}: {err}", path.display()))
            })?;
            games = games.with_archive(logger);
        }

        Ok(Self::new_with_dependencies(
            config,
            settings,
            event_bus,
            Arc::new(games),
        ))
    }

    pub fn new_with_dependencies(
        config: ServerConfig,
        settings: AppSettings,
        event_bus: Arc<EventBus>,
        games: Arc<GameService>,
    ) -> Self {
        Self {
            config,
            settings,
            event_bus,
            games,
        }
    }

    pub fn new_for_tests() -> Self {
        let event_bus = Arc::new(EventBus::new());
        let games = GameService::new(Arc::new(InMemoryGameStore::new()), Arc::clone(&event_bus));
        Self::new_with_dependencies(
            ServerConfig::for_tests(),
            AppSettings::default(),
            event_bus,
            Arc::new(games),
        )
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn games(&self) -> Arc<GameService> {
        Arc::clone(&self.games)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[derive(Debug, Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(config: ServerConfig, settings: AppSettings) -> Result<Self, ServerError> {
        let context = AppContext::new(config, settings)?;
        Ok(Self { context })
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let config = context.config().clone();
        let bind_addr = Self::bind_addr(&config)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let routes = with_request_logging(Self::routes(&context));
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        tracing::info!(address = %addr, "web server listening");

        let task = tokio::spawn(async move {
            server_future.await;
            Ok(())
        });

        Ok(ServerHandle::new(addr, shutdown_tx, task, context))
    }

    fn bind_addr(config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        let host = config.host();

        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }

        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, config.port()));
        }

        let candidate = format!("{}:{}", host, config.port());
        let mut addrs = candidate.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`: {err}"))
        })?;

        addrs.next().ok_or_else(|| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`"))
        })
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(source) = err.source() {
            if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
                let recreated = std::io::Error::new(io_err.kind(), io_err.to_string());
                return ServerError::BindError(recreated);
            }
        }

        ServerError::ConfigError(err.to_string())
    }

    /// Every route the server exposes, without the logging wrapper.
    pub fn routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let health = Self::health_route();
        let command_routes = Self::command_routes(context);
        let query_routes = Self::query_routes(context);
        let sse_routes = Self::sse_routes(context);

        health
            .or(command_routes)
            .unify()
            .or(query_routes)
            .unify()
            .or(sse_routes)
            .unify()
            .boxed()
    }

    fn health_route() -> BoxedFilter<(Response,)> {
        warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .map(|| handlers::health().into_response())
            .boxed()
    }

    fn command_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let games = context.games();

        let start = warp::path!("api" / "games")
            .and(warp::post())
            .and(Self::with_games(games.clone()))
            .and(warp::body::json())
            .and_then(
                |games: Arc<GameService>, request: handlers::StartGameRequest| async move {
                    let response = handlers::start_game(games, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let setup = warp::path!("api" / "games" / String / "setup")
            .and(warp::post())
            .and(Self::with_games(games.clone()))
            .and(Self::caller())
            .and(warp::body::json())
            .and_then(
                |game_id: String,
                 games: Arc<GameService>,
                 caller: Option<String>,
                 request: handlers::SetupRequest| async move {
                    let response = handlers::setup_pieces(games, game_id, caller, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let moves = warp::path!("api" / "games" / String / "moves")
            .and(warp::post())
            .and(Self::with_games(games.clone()))
            .and(Self::caller())
            .and(warp::body::json())
            .and_then(
                |game_id: String,
                 games: Arc<GameService>,
                 caller: Option<String>,
                 request: handlers::MoveRequest| async move {
                    let response = handlers::make_move(games, game_id, caller, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let surrender = warp::path!("api" / "games" / String / "surrender")
            .and(warp::post())
            .and(Self::with_games(games.clone()))
            .and(Self::caller())
            .and_then(
                |game_id: String, games: Arc<GameService>, caller: Option<String>| async move {
                    let response = handlers::surrender(games, game_id, caller).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let timeout = warp::path!("api" / "games" / String / "timeout")
            .and(warp::post())
            .and(Self::with_games(games.clone()))
            .and(Self::caller())
            .and_then(
                |game_id: String, games: Arc<GameService>, caller: Option<String>| async move {
                    let response = handlers::timeout(games, game_id, caller).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let timeout_check = warp::path!("api" / "games" / String / "timeout-check")
            .and(warp::post())
            .and(Self::with_games(games.clone()))
            .and(Self::caller())
            .and_then(
                |game_id: String, games: Arc<GameService>, caller: Option<String>| async move {
                    let response = handlers::check_timeout(games, game_id, caller).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let forfeit = warp::path!("api" / "games" / String / "forfeit")
            .and(warp::post())
            .and(Self::with_games(games.clone()))
            .and(warp::body::json())
            .and_then(
                |game_id: String,
                 games: Arc<GameService>,
                 request: handlers::ForfeitRequest| async move {
                    let response = handlers::forfeit(games, game_id, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let acknowledge = warp::path!("api" / "games" / String / "acknowledge")
            .and(warp::post())
            .and(Self::with_games(games))
            .and(Self::caller())
            .and_then(
                |game_id: String, games: Arc<GameService>, caller: Option<String>| async move {
                    let response = handlers::acknowledge(games, game_id, caller).await;
                    Ok::<_, Infallible>(response)
                },
            );

        start
            .or(setup)
            .unify()
            .or(moves)
            .unify()
            .or(surrender)
            .unify()
            .or(timeout)
            .unify()
            .or(timeout_check)
            .unify()
            .or(forfeit)
            .unify()
            .or(acknowledge)
            .unify()
            .boxed()
    }

    fn query_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let games = context.games();

        let game = warp::path!("api" / "games" / String)
            .and(warp::get())
            .and(Self::with_games(games.clone()))
            .and(Self::caller())
            .and_then(
                |game_id: String, games: Arc<GameService>, caller: Option<String>| async move {
                    let response = handlers::get_game(games, game_id, caller).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let result = warp::path!("api" / "games" / String / "result")
            .and(warp::get())
            .and(Self::with_games(games.clone()))
            .and(Self::caller())
            .and_then(
                |game_id: String, games: Arc<GameService>, caller: Option<String>| async move {
                    let response = handlers::match_result(games, game_id, caller).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let replay = warp::path!("api" / "games" / String / "replay")
            .and(warp::get())
            .and(Self::with_games(games))
            .and(Self::caller())
            .and(warp::query::<handlers::ReplayQuery>())
            .and_then(
                |game_id: String,
                 games: Arc<GameService>,
                 caller: Option<String>,
                 query: handlers::ReplayQuery| async move {
                    let response = handlers::replay(games, game_id, caller, query).await;
                    Ok::<_, Infallible>(response)
                },
            );

        game.or(result).unify().or(replay).unify().boxed()
    }

    fn sse_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let games = context.games();
        let event_bus = context.event_bus();

        warp::path!("api" / "games" / String / "events")
            .and(warp::get())
            .and(Self::caller())
            .and(Self::with_games(games))
            .and(Self::with_event_bus(event_bus))
            .and_then(
                |game_id: String,
                 caller: Option<String>,
                 games: Arc<GameService>,
                 event_bus: Arc<EventBus>| async move {
                    let response =
                        handlers::stream_events(game_id, caller, games, event_bus).await;
                    Ok::<_, Infallible>(response)
                },
            )
            .boxed()
    }

    /// Identity of the calling player, as forwarded by the authenticating
    /// proxy in front of this service.
    fn caller() -> impl Filter<Extract = (Option<String>,), Error = Infallible> + Clone {
        warp::header::optional::<String>(PLAYER_HEADER)
            .or(warp::any().map(|| None::<String>))
            .unify()
            .map(|id: Option<String>| id.filter(|id| !id.trim().is_empty()))
    }

    fn with_games(
        games: Arc<GameService>,
    ) -> impl Filter<Extract = (Arc<GameService>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&games))
    }

    fn with_event_bus(
        event_bus: Arc<EventBus>,
    ) -> impl Filter<Extract = (Arc<EventBus>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&event_bus))
    }
}

#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
    context: AppContext,
}

impl ServerHandle {
    fn new(
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Result<(), ServerError>>,
        context: AppContext,
    ) -> Self {
        Self {
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
            context,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(result) => result?,
                Err(err) => {
                    return Err(ServerError::ConfigError(format!(
                        "server task join error: {err}"
                    )))
                }
            }
        }

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
