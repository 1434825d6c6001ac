// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! The set of attached processes.
//!
//! The cache is the only owner of handle lifetime: it attaches to processes
//! when they appear and detaches from them when they vanish or when the
//! cache shuts down. The visible set is an immutable map behind an `Arc`;
//! a refresh builds a new map and swaps it in, so readers never observe a
//! half-updated set.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use log::{debug, info};

use crate::app::AppHandle;
use crate::attach::Attacher;
use crate::attach::hotspot::HotSpotAttacher;
use crate::config::Config;
use crate::errors::Result;
use crate::management::Connector;
use crate::management::jolokia::JolokiaConnector;

type HandleMap = BTreeMap<i32, Arc<AppHandle>>;

pub struct ProcessCache {
    attacher: Box<dyn Attacher>,
    connector: Arc<dyn Connector>,
    config: Arc<Config>,
    handles: RwLock<Arc<HandleMap>>,
    refresh_lock: Mutex<()>,
}

impl ProcessCache {
    /// An empty cache. Nothing is attached until the first refresh.
    pub fn new(
        attacher: Box<dyn Attacher>,
        connector: Arc<dyn Connector>,
        config: Config,
    ) -> Self {
        Self {
            attacher,
            connector,
            config: Arc::new(config),
            handles: RwLock::new(Arc::new(HandleMap::new())),
            refresh_lock: Mutex::new(()),
        }
    }

    /// A cache attaching to local HotSpot JVMs and querying them over Jolokia.
    pub fn with_hotspot(config: Config) -> Self {
        let attacher = HotSpotAttacher::new(config.attach_timeout(), config.request_timeout());
        let connector = JolokiaConnector::new(config.request_timeout());
        Self::new(Box::new(attacher), Arc::new(connector), config)
    }

    fn current(&self) -> Arc<HandleMap> {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, handles: HandleMap) -> Arc<HandleMap> {
        let mut current = self.handles.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, Arc::new(handles))
    }

    /// The handles attached by the last refresh, ordered by pid.
    pub fn snapshot(&self) -> Vec<Arc<AppHandle>> {
        self.current().values().cloned().collect()
    }

    pub fn get(&self, pid: i32) -> Option<Arc<AppHandle>> {
        self.current().get(&pid).cloned()
    }

    /// Synchronizes the handle set with the live process table.
    ///
    /// Processes that fail to attach are skipped and retried on the next
    /// refresh. Only a failure to enumerate processes is reported.
    pub fn refresh(&self) -> Result<()> {
        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let processes = self.attacher.list()?;
        let previous = self.current();

        let mut next = HandleMap::new();
        for descriptor in processes {
            if let Some(existing) = previous.get(&descriptor.pid) {
                existing.set_display_name(&descriptor.display_name);
                next.insert(descriptor.pid, existing.clone());
                continue;
            }

            match self.attacher.attach(&descriptor) {
                Ok(vm) => {
                    let handle = AppHandle::new(
                        &descriptor,
                        vm,
                        self.connector.clone(),
                        self.config.clone(),
                    );
                    next.insert(descriptor.pid, Arc::new(handle));
                }
                Err(e) => debug!("Skipping pid {}: {e}", descriptor.pid),
            }
        }

        let previous = self.publish(next);
        let current = self.current();
        for (pid, handle) in previous.iter() {
            if !current.contains_key(pid) {
                handle.detach();
            }
        }
        Ok(())
    }

    /// The handle for `pid`, attaching to that process alone when it is not
    /// in the cache yet. No other process is touched.
    pub fn attach_pid(&self, pid: i32) -> Option<Arc<AppHandle>> {
        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let descriptor = self.attacher.describe(pid)?;
        let current = self.current();
        if let Some(existing) = current.get(&pid) {
            existing.set_display_name(&descriptor.display_name);
            return Some(existing.clone());
        }

        let vm = match self.attacher.attach(&descriptor) {
            Ok(vm) => vm,
            Err(e) => {
                debug!("Unable to attach to pid {pid}: {e}");
                return None;
            }
        };
        let handle = Arc::new(AppHandle::new(
            &descriptor,
            vm,
            self.connector.clone(),
            self.config.clone(),
        ));

        let mut next = HandleMap::clone(&current);
        next.insert(pid, handle.clone());
        self.publish(next);
        Some(handle)
    }

    /// Refreshes, then returns every attached process.
    pub fn all_attached(&self) -> Result<Vec<Arc<AppHandle>>> {
        self.refresh()?;
        Ok(self.snapshot())
    }

    /// Refreshes, then returns the attached processes identified as Spring
    /// Boot applications.
    pub fn spring_boot_apps(&self) -> Result<Vec<Arc<AppHandle>>> {
        Ok(self
            .all_attached()?
            .into_iter()
            .filter(|app| app.is_spring_boot_app())
            .collect())
    }

    /// Detaches from every process. The cache is empty afterwards and can
    /// be refreshed again.
    pub fn shutdown(&self) {
        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let previous = self.publish(HandleMap::new());
        if !previous.is_empty() {
            info!("Detaching from {} processes", previous.len());
        }
        for handle in previous.values() {
            handle.detach();
        }
    }
}

impl Drop for ProcessCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
