// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    DhcpError, DhcpV6Client, DhcpV6Config, DhcpV6GlobalConfig, DhcpV6Lease,
};

/// One managed interface: the running client plus the request used to
/// (re)create it, so `restart_all` can re-acquire without the caller
/// having to remember what it originally asked for.
#[derive(Debug)]
pub struct DeviceContext {
    pub client: DhcpV6Client,
    request: DhcpV6Config,
}

impl DeviceContext {
    pub fn client(&self) -> &DhcpV6Client {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut DhcpV6Client {
        &mut self.client
    }
}

/// Set of active devices keyed by interface index (section 4.G). Owns every
/// `DhcpV6Client` it creates; nothing outside the registry mutates one
/// directly once handed in.
#[derive(Debug)]
pub struct DhcpV6Registry {
    devices: HashMap<u32, DeviceContext>,
    global: Arc<DhcpV6GlobalConfig>,
}

impl DhcpV6Registry {
    pub fn new(global: Arc<DhcpV6GlobalConfig>) -> Self {
        Self {
            devices: HashMap::new(),
            global,
        }
    }

    pub fn get(&self, ifindex: u32) -> Option<&DeviceContext> {
        self.devices.get(&ifindex)
    }

    pub fn get_mut(&mut self, ifindex: u32) -> Option<&mut DeviceContext> {
        self.devices.get_mut(&ifindex)
    }

    /// Start acquiring on `config`'s interface if it is not already
    /// managed; otherwise returns the existing device untouched.
    pub fn get_or_create(
        &mut self,
        ifindex: u32,
        config: DhcpV6Config,
    ) -> Result<&mut DeviceContext, DhcpError> {
        if !self.devices.contains_key(&ifindex) {
            let client = DhcpV6Client::init_with_global(
                config.clone(),
                None,
                Arc::clone(&self.global),
            )?;
            self.devices.insert(
                ifindex,
                DeviceContext {
                    client,
                    request: config,
                },
            );
        }
        Ok(self.devices.get_mut(&ifindex).expect("just inserted"))
    }

    pub fn remove(&mut self, ifindex: u32) -> Option<DeviceContext> {
        self.devices.remove(&ifindex)
    }

    pub fn for_each(&mut self, mut f: impl FnMut(u32, &mut DhcpV6Client)) {
        for (ifindex, ctx) in self.devices.iter_mut() {
            f(*ifindex, &mut ctx.client);
        }
    }

    /// Replace the shared read-only view atomically; in-flight exchanges
    /// keep running against the snapshot they already hold and pick up the
    /// new one on their next acquisition (section 4.H).
    pub fn set_global(&mut self, global: Arc<DhcpV6GlobalConfig>) {
        self.global = global;
    }

    /// Re-invoke acquisition on every managed device using its stored
    /// request, preserving request identity (section 4.G). Used after a
    /// link flap or a reconfiguration wide enough to need a clean restart.
    pub fn restart_all(&mut self) -> Result<(), DhcpError> {
        let ifindices: Vec<u32> = self.devices.keys().copied().collect();
        for ifindex in ifindices {
            let request =
                self.devices.get(&ifindex).map(|c| c.request.clone());
            if let Some(request) = request {
                let client = DhcpV6Client::init_with_global(
                    request.clone(),
                    None,
                    Arc::clone(&self.global),
                )?;
                self.devices.insert(
                    ifindex,
                    DeviceContext { client, request },
                );
            }
        }
        Ok(())
    }

    /// The interface came back up: restart acquisition from scratch.
    pub fn on_link_up(&mut self, ifindex: u32) -> Result<(), DhcpError> {
        let request = match self.devices.get(&ifindex) {
            Some(ctx) => ctx.request.clone(),
            None => return Ok(()),
        };
        let client = DhcpV6Client::init_with_global(
            request.clone(),
            None,
            Arc::clone(&self.global),
        )?;
        self.devices.insert(ifindex, DeviceContext { client, request });
        Ok(())
    }

    /// The interface went down: drop whatever lease/exchange was in
    /// progress and idle the client in `Init` (socket and timer torn down).
    /// The `DeviceContext`/request stays registered so `on_link_up` knows
    /// what to re-request.
    pub fn on_link_down(&mut self, ifindex: u32) {
        if let Some(ctx) = self.devices.get_mut(&ifindex) {
            ctx.client.drop_lease();
        }
    }

    pub fn leases(&self) -> Vec<(u32, DhcpV6Lease)> {
        self.devices
            .iter()
            .filter_map(|(ifindex, ctx)| match ctx.client.state() {
                crate::DhcpV6State::Bound(lease) => {
                    Some((*ifindex, lease.as_ref().clone()))
                }
                _ => None,
            })
            .collect()
    }
}
