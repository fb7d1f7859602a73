// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use futures::StreamExt;
use glbc::{
    config::{Config, DnsProviderKind, HostResolverKind},
    constants::{
        EDGE_NODE_ID, METRICS_SERVER_PATH, SNAPSHOT_SERVER_PATH, TOKIO_WORKER_THREADS,
    },
    context::{Context, EdgeProxy},
    controller::{error_policy, key_stream, reconcile, shutdown_requested, Runner},
    crd::DNSRecord,
    dns::{FakeProvider, Provider, Rfc2136Provider, ZonePublisher},
    edge::{SnapshotCache, WatchSnapshotSink},
    events::{leaf_owner_refs, selected_deployments, service_dependents, shadow_owner_ref},
    key::ObjectKey,
    metrics,
    net::{ConfigMapHostResolver, DnsHostResolver, HostResolver, HostsWatcher, SafeHostResolver},
    reconcilers::{
        DNSRecordReconciler, DeploymentShadowReconciler, IngressReconciler,
        ServiceShadowReconciler,
    },
    store::KubeStore,
    tls::{CertificateProvider, FakeCertificateProvider},
    tracker::Tracker,
};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::{controller, watcher, Controller};
use kube::{Api, Client};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let config = Config::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("glbc-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

fn init_tracing() {
    // RUST_LOG selects levels (default info), RUST_LOG_FORMAT=json switches to JSON output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: Config) -> Result<()> {
    init_tracing();
    info!(domain = %config.domain, "Starting glbc");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let (shutdown_tx, shutdown) = watch::channel(false);

    let resolver = build_resolver(&config, &client)?;
    let provider = build_provider(&config)?;
    let zones = config.zones();
    if zones.is_empty() {
        warn!("No DNS zone configured, DNS records will not be published anywhere");
    }

    let certificates: Option<Arc<dyn CertificateProvider>> = if config.tls_enabled {
        warn!("TLS enabled with the no-op certificate provider");
        let provider: Arc<dyn CertificateProvider> = Arc::new(FakeCertificateProvider::new());
        provider
            .initialize()
            .await
            .context("failed to initialize certificate provider")?;
        Some(provider)
    } else {
        None
    };

    let sink = Arc::new(WatchSnapshotSink::new());
    let edge = config
        .edge_proxy_enabled
        .then(|| EdgeProxy::new(Arc::new(SnapshotCache::new()), sink.clone()));

    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let tracker = Arc::new(Tracker::new());
    let ctx = Arc::new(Context {
        store: Arc::new(KubeStore::new(client.clone())),
        tracker: Arc::clone(&tracker),
        hosts_watcher: Arc::new(HostsWatcher::new(
            Arc::clone(&resolver),
            notify_tx,
            shutdown.clone(),
        )),
        resolver,
        certificates,
        edge,
        publisher: Arc::new(ZonePublisher::new(provider)),
        settings: config.settings(),
    });

    let snapshots = config.edge_proxy_enabled.then_some(sink);
    let server = tokio::spawn(run_http_server(
        config.metrics_bind_address,
        snapshots,
        shutdown.clone(),
    ));

    let controllers = vec![
        tokio::spawn(run_ingress_controller(
            client.clone(),
            Arc::clone(&ctx),
            tracker,
            notify_rx,
            config.workers,
            shutdown.clone(),
        )),
        tokio::spawn(run_dns_record_controller(
            client.clone(),
            Arc::clone(&ctx),
            config.workers,
            shutdown.clone(),
        )),
        tokio::spawn(run_service_shadow_controller(
            client.clone(),
            config.workers,
            shutdown.clone(),
        )),
        tokio::spawn(run_deployment_shadow_controller(
            client,
            config.workers,
            shutdown.clone(),
        )),
    ];

    info!("Controllers started");
    shutdown_signal().await?;
    info!("Shutdown signal received, stopping");
    shutdown_tx.send_replace(true);

    for handle in controllers {
        if let Err(e) = handle.await {
            error!(error = %e, "Task failed during shutdown");
        }
    }
    match server.await {
        Ok(Err(e)) => error!(error = ?e, "HTTP server failed"),
        Err(e) => error!(error = %e, "HTTP server task failed"),
        Ok(Ok(())) => {}
    }

    info!("glbc stopped");
    Ok(())
}

fn controller_config(workers: u16) -> controller::Config {
    controller::Config::default().concurrency(workers)
}

/// Run the Ingress controller.
///
/// Besides its own Ingress events it is triggered by leaf changes (for their
/// root), by changes of tracked backend Services and by resolved address changes.
async fn run_ingress_controller(
    client: Client,
    ctx: Arc<Context>,
    tracker: Arc<Tracker>,
    notify_rx: mpsc::UnboundedReceiver<ObjectKey>,
    workers: u16,
    shutdown: watch::Receiver<bool>,
) {
    info!("Starting Ingress controller");

    let api = Api::<Ingress>::all(client.clone());
    let services = Api::<Service>::all(client);

    Controller::new(api.clone(), watcher::Config::default())
        .watches(api, watcher::Config::default(), |ingress| {
            leaf_owner_refs(&ingress)
        })
        .watches(services, watcher::Config::default(), move |service| {
            service_dependents(&tracker, &service)
        })
        .reconcile_on(key_stream(notify_rx))
        .with_config(controller_config(workers))
        .graceful_shutdown_on(shutdown_requested(shutdown))
        .run(
            reconcile::<Ingress, IngressReconciler>,
            error_policy::<Ingress, IngressReconciler>,
            Runner::new(Arc::new(IngressReconciler::new(ctx))),
        )
        .for_each(|_| futures::future::ready(()))
        .await;
}

/// Run the `DNSRecord` controller
async fn run_dns_record_controller(
    client: Client,
    ctx: Arc<Context>,
    workers: u16,
    shutdown: watch::Receiver<bool>,
) {
    info!("Starting DNSRecord controller");

    let api = Api::<DNSRecord>::all(client);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config(workers))
        .graceful_shutdown_on(shutdown_requested(shutdown))
        .run(
            reconcile::<DNSRecord, DNSRecordReconciler>,
            error_policy::<DNSRecord, DNSRecordReconciler>,
            Runner::new(Arc::new(DNSRecordReconciler::new(ctx))),
        )
        .for_each(|_| futures::future::ready(()))
        .await;
}

/// Run the Service shadow controller
async fn run_service_shadow_controller(
    client: Client,
    workers: u16,
    shutdown: watch::Receiver<bool>,
) {
    info!("Starting Service shadow controller");

    let api = Api::<Service>::all(client.clone());
    let reconciler = ServiceShadowReconciler::new(Arc::new(KubeStore::new(client)));

    Controller::new(api.clone(), watcher::Config::default())
        .watches(api, watcher::Config::default(), |service| {
            shadow_owner_ref(&service)
        })
        .with_config(controller_config(workers))
        .graceful_shutdown_on(shutdown_requested(shutdown))
        .run(
            reconcile::<Service, ServiceShadowReconciler>,
            error_policy::<Service, ServiceShadowReconciler>,
            Runner::new(Arc::new(reconciler)),
        )
        .for_each(|_| futures::future::ready(()))
        .await;
}

/// Run the Deployment shadow controller.
///
/// Root Service changes re-place the Deployments they select.
async fn run_deployment_shadow_controller(
    client: Client,
    workers: u16,
    shutdown: watch::Receiver<bool>,
) {
    info!("Starting Deployment shadow controller");

    let api = Api::<Deployment>::all(client.clone());
    let services = Api::<Service>::all(client.clone());
    let store = Arc::new(KubeStore::new(client));
    let reconciler = DeploymentShadowReconciler::new(store.clone(), store);

    let controller = Controller::new(api.clone(), watcher::Config::default());
    let deployments = controller.store();
    controller
        .watches(api, watcher::Config::default(), |deployment| {
            shadow_owner_ref(&deployment)
        })
        .watches(services, watcher::Config::default(), move |service| {
            selected_deployments(&deployments.state(), &service)
        })
        .with_config(controller_config(workers))
        .graceful_shutdown_on(shutdown_requested(shutdown))
        .run(
            reconcile::<Deployment, DeploymentShadowReconciler>,
            error_policy::<Deployment, DeploymentShadowReconciler>,
            Runner::new(Arc::new(reconciler)),
        )
        .for_each(|_| futures::future::ready(()))
        .await;
}

fn build_resolver(config: &Config, client: &Client) -> Result<Arc<dyn HostResolver>> {
    Ok(match config.host_resolver {
        HostResolverKind::Dns => {
            info!("Resolving load balancer hosts through the system resolver");
            Arc::new(SafeHostResolver::new(DnsHostResolver::from_system_conf()?))
        }
        HostResolverKind::ConfigMap => {
            let (namespace, name) = config.config_map_ref()?;
            info!(namespace = %namespace, name = %name, "Resolving load balancer hosts from a ConfigMap");
            Arc::new(SafeHostResolver::new(ConfigMapHostResolver::new(
                client.clone(),
                &namespace,
                &name,
            )))
        }
    })
}

fn build_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    Ok(match config.dns_provider {
        DnsProviderKind::Fake => {
            info!("Using the fake DNS provider");
            Arc::new(FakeProvider::new())
        }
        DnsProviderKind::Rfc2136 => {
            let server = config
                .rfc2136_server
                .context("--rfc2136-server is required with the rfc2136 provider")?;
            info!(server = %server, "Using the RFC 2136 DNS provider");
            Arc::new(Rfc2136Provider::new(server, config.tsig_key()?)?)
        }
    })
}

async fn shutdown_signal() -> Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

async fn run_http_server(
    address: SocketAddr,
    snapshots: Option<Arc<WatchSnapshotSink>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));
    if let Some(sink) = snapshots {
        app = app.route(
            SNAPSHOT_SERVER_PATH,
            get(move || async move { Json(sink.current(EDGE_NODE_ID).unwrap_or_default()) }),
        );
    }

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(address = %address, "Serving metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
