use std::path::PathBuf;
use std::time::Duration;

use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use parking_lot::RwLock;

use crate::cache::ProblemCache;
use crate::domain::coordinator::RunCoordinator;
use crate::domain::load::ProblemInput;
use crate::domain::lp_format;
use crate::domain::registry::{SolverDescriptor, SolverHandle, SolverRegistry};
use crate::domain::solve::solve_loaded;
use crate::error::RegistryError;
use crate::models::{
    ApiEntry, ApiError, ApiSolver, EncodeRequest, EncodeResponse, RegisterSolverRequest,
    SolveRequest, SolveResponse,
};

/// Shared server state.
pub struct AppState {
    pub registry: RwLock<SolverRegistry>,
    pub coordinator: RunCoordinator,
    pub cache: ProblemCache,
    pub report_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        registry: SolverRegistry,
        coordinator: RunCoordinator,
        cache: ProblemCache,
        report_path: Option<PathBuf>,
    ) -> Self {
        AppState {
            registry: RwLock::new(registry),
            coordinator,
            cache,
            report_path,
        }
    }
}

/// JSON extractor settings: payload limit and `{"error": ...}` bodies for bad requests.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _| {
            let err_string = err.to_string();
            actix_web::error::InternalError::from_response(
                err,
                HttpResponse::BadRequest().json(ApiError::new(err_string)),
            )
            .into()
        })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/encode", web::post().to(encode))
        .route("/solve", web::post().to(solve))
        .route("/solvers", web::get().to(list_solvers))
        .route("/solvers", web::post().to(register_solver))
        .route("/solvers/{name}", web::delete().to(deregister_solver))
        .route("/solvers/{name}/enable", web::post().to(enable_solver))
        .route("/solvers/{name}/disable", web::post().to(disable_solver));
}

fn registry_error_response(err: RegistryError) -> HttpResponse {
    match err {
        RegistryError::Duplicate(_) => HttpResponse::Conflict().json(ApiError::new(err)),
        RegistryError::UnknownSolver(_) => HttpResponse::NotFound().json(ApiError::new(err)),
        RegistryError::InvalidHandle(_) => HttpResponse::BadRequest().json(ApiError::new(err)),
    }
}

/// GET /health
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

/// POST /encode
pub async fn encode(state: web::Data<AppState>, req: web::Json<EncodeRequest>) -> impl Responder {
    let input: ProblemInput = req.into_inner().into();

    match state.cache.load(&input) {
        Ok(problem) => HttpResponse::Ok().json(EncodeResponse {
            identity: problem.identity.to_string(),
            origin: problem.origin,
            variables: problem.program.variables.len(),
            constraints: problem.program.constraints.len(),
            lp: lp_format::render(&problem.program),
        }),
        Err(failure) => HttpResponse::BadRequest().json(ApiError::new(failure.reason)),
    }
}

/// POST /solve
pub async fn solve(state: web::Data<AppState>, req: web::Json<SolveRequest>) -> impl Responder {
    let req = req.into_inner();

    if req.problems.is_empty() {
        return HttpResponse::BadRequest().json(ApiError::new("no problems submitted"));
    }

    let time_limit = match req.time_limit_secs {
        None => state.coordinator.config().time_limit,
        Some(secs) => match Duration::try_from_secs_f64(secs) {
            Ok(limit) if !limit.is_zero() => Some(limit),
            _ => {
                return HttpResponse::BadRequest()
                    .json(ApiError::new(format!("invalid time_limit_secs: {}", secs)))
            }
        },
    };
    let coordinator = state.coordinator.with_time_limit(time_limit);

    let inputs: Vec<ProblemInput> = req.problems.into_iter().map(Into::into).collect();
    let loaded = state.cache.load_batch(&inputs);
    // Snapshot taken once per session
    let solvers: Vec<SolverDescriptor> = state.registry.read().enabled();

    let result = solve_loaded(&coordinator, loaded, solvers).await;

    if let Some(path) = &state.report_path {
        if let Err(e) = result.persist(path) {
            error!("Failed to write report to {}: {}", path.display(), e);
        }
    }

    HttpResponse::Ok().json(SolveResponse {
        entries: result.summary.entries().iter().map(ApiEntry::from).collect(),
        report: result.summary.render_report(),
        histogram: result.histogram,
    })
}

/// GET /solvers
pub async fn list_solvers(state: web::Data<AppState>) -> impl Responder {
    let solvers: Vec<ApiSolver> = state.registry.read().list().iter().map(ApiSolver::from).collect();
    HttpResponse::Ok().json(solvers)
}

/// POST /solvers
pub async fn register_solver(
    state: web::Data<AppState>,
    req: web::Json<RegisterSolverRequest>,
) -> impl Responder {
    let req = req.into_inner();

    let handle = match SolverHandle::parse(&req.handle) {
        Ok(handle) => handle,
        Err(e) => return registry_error_response(e),
    };
    let mut descriptor = SolverDescriptor::new(req.name, handle);
    descriptor.enabled = req.enabled.unwrap_or(true);
    let body = ApiSolver::from(&descriptor);

    let registered = state.registry.write().register(descriptor);
    match registered {
        Ok(()) => {
            info!("Solver {} registered via API", body.name);
            HttpResponse::Created().json(body)
        }
        Err(e) => registry_error_response(e.into()),
    }
}

/// DELETE /solvers/{name}
pub async fn deregister_solver(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let removed = state.registry.write().deregister(&path.into_inner());
    match removed {
        Ok(descriptor) => HttpResponse::Ok().json(ApiSolver::from(&descriptor)),
        Err(e) => registry_error_response(e),
    }
}

/// POST /solvers/{name}/enable
pub async fn enable_solver(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    set_enabled(&state, &path.into_inner(), true)
}

/// POST /solvers/{name}/disable
pub async fn disable_solver(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    set_enabled(&state, &path.into_inner(), false)
}

fn set_enabled(state: &AppState, name: &str, enabled: bool) -> HttpResponse {
    let mut registry = state.registry.write();
    let toggled = if enabled {
        registry.enable(name)
    } else {
        registry.disable(name)
    };

    match toggled.map(|_| registry.get(name).map(ApiSolver::from)) {
        Ok(Some(solver)) => HttpResponse::Ok().json(solver),
        Ok(None) => registry_error_response(RegistryError::UnknownSolver(name.to_string())),
        Err(e) => registry_error_response(e),
    }
}
