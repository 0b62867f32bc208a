// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP gateway simulator
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The simulator is the server standing in
//! for the GMOD gateway; the bridge is the client.
//!
//! ## Register Map
//!
//! ### Holding Registers (Read/Write)
//!
//! | Register Address | Description | Count |
//! |-----------------|-------------|-------|
//! | write base (1999) | Signals commanded by the bridge | 25 |
//! | read base (1099) | Signals reported by the controller | 25 |
//!
//! Any other address answers `IllegalDataAddress`. Function codes other than
//! read holding registers (0x03), write single register (0x06) and write
//! multiple registers (0x10) answer `IllegalFunction`.
//!
//! With loopback enabled, every write to the write block is mirrored into the
//! read block, so the bridge reads back what it wrote.

use std::{
    collections::HashMap,
    future,
    io,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use crate::codec::{WordBlock, WORD_COUNT};
use crate::config::RegisterMap;

/// Modbus TCP server holding the two register blocks of the gateway.
///
/// Clones share the same registers, one clone serves each client connection.
#[derive(Clone)]
pub struct GatewaySimulator {
    /// Holding registers of both blocks
    pub holding_registers: Arc<Mutex<HashMap<u16, u16>>>,

    registers: RegisterMap,
    loopback: bool,
}

impl tokio_modbus::server::Service for GatewaySimulator {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    /// Process a Modbus request and provide a response
    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Received Modbus request: {:?}", req);

        let mut holding = match self.holding_registers.lock() {
            Ok(guard) => guard,
            Err(_) => {
                error!("Register map lock poisoned");
                return future::ready(Err(ExceptionCode::ServerDeviceFailure));
            }
        };

        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => {
                debug!(
                    "Reading {} holding registers starting from address {}",
                    cnt, addr
                );
                register_read(&holding, addr, cnt).map(Response::ReadHoldingRegisters)
            }
            Request::WriteMultipleRegisters(addr, values) => {
                debug!(
                    "Writing {} values to holding registers starting from address {}",
                    values.len(),
                    addr
                );
                register_write(&mut holding, addr, &values).map(|_| {
                    if self.loopback && addr == self.registers.write_address {
                        mirror(&mut holding, self.registers.read_address, &values);
                    }
                    Response::WriteMultipleRegisters(addr, values.len() as u16)
                })
            }
            Request::WriteSingleRegister(addr, value) => {
                debug!("Writing value {} to holding register {}", value, addr);
                register_write(&mut holding, addr, std::slice::from_ref(&value))
                    .map(|_| Response::WriteSingleRegister(addr, value))
            }
            _ => {
                error!(
                    "Exception::IllegalFunction - Unimplemented function code in request: {req:?}"
                );
                Err(ExceptionCode::IllegalFunction)
            }
        };

        if let Err(e) = &res {
            error!("Modbus request error: {:?}", e);
        }

        future::ready(res)
    }
}

impl GatewaySimulator {
    /// Create a simulator with both register blocks cleared
    pub fn new(registers: RegisterMap, loopback: bool) -> Self {
        let mut holding_registers = HashMap::new();
        for offset in 0..WORD_COUNT as u16 {
            holding_registers.insert(registers.write_address + offset, 0);
            holding_registers.insert(registers.read_address + offset, 0);
        }
        Self {
            holding_registers: Arc::new(Mutex::new(holding_registers)),
            registers,
            loopback,
        }
    }

    /// Block last written by the bridge
    pub fn written_block(&self) -> Option<WordBlock> {
        self.block(self.registers.write_address)
    }

    /// Block the bridge will read next
    pub fn read_block(&self) -> Option<WordBlock> {
        self.block(self.registers.read_address)
    }

    /// Replace the block the bridge will read next
    pub fn set_read_block(&self, words: &WordBlock) {
        if let Ok(mut holding) = self.holding_registers.lock() {
            mirror(&mut holding, self.registers.read_address, words.as_slice());
        }
    }

    fn block(&self, address: u16) -> Option<WordBlock> {
        let holding = self.holding_registers.lock().ok()?;
        let words = register_read(&holding, address, WORD_COUNT as u16).ok()?;
        WordBlock::from_slice(&words).ok()
    }

    /// Serve Modbus TCP clients on `listener` until the task is dropped
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        let local_addr = listener.local_addr()?;
        info!("Gateway simulator listening on {}", local_addr);

        let server = Server::new(listener);
        let on_connected = move |stream, socket_addr: SocketAddr| {
            let simulator = self.clone();
            async move {
                debug!("Client connected from {}", socket_addr);
                accept_tcp_connection(stream, socket_addr, move |_| Ok(Some(simulator.clone())))
            }
        };
        let on_process_error = |err| {
            error!("Gateway simulator error: {}", err);
        };
        server.serve(&on_connected, on_process_error).await
    }
}

/// Helper function implementing reading registers from a HashMap.
fn register_read(
    registers: &HashMap<u16, u16>,
    addr: u16,
    cnt: u16,
) -> Result<Vec<u16>, ExceptionCode> {
    let mut response_values = vec![0; cnt.into()];
    for i in 0..cnt {
        let reg_addr = addr.wrapping_add(i);
        if let Some(r) = registers.get(&reg_addr) {
            response_values[i as usize] = *r;
        } else {
            error!("Exception::IllegalDataAddress {}", reg_addr);
            return Err(ExceptionCode::IllegalDataAddress);
        }
    }

    Ok(response_values)
}

/// Write holding registers. Used by both the write single register
/// and write multiple registers requests.
///
/// The whole range is checked before any register changes.
fn register_write(
    registers: &mut HashMap<u16, u16>,
    addr: u16,
    values: &[u16],
) -> Result<(), ExceptionCode> {
    for i in 0..values.len() {
        let reg_addr = addr.wrapping_add(i as u16);
        if !registers.contains_key(&reg_addr) {
            error!("Exception::IllegalDataAddress {}", reg_addr);
            return Err(ExceptionCode::IllegalDataAddress);
        }
    }
    mirror(registers, addr, values);
    Ok(())
}

fn mirror(registers: &mut HashMap<u16, u16>, addr: u16, values: &[u16]) {
    for (i, value) in values.iter().enumerate() {
        registers.insert(addr.wrapping_add(i as u16), *value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_modbus::server::Service;

    fn simulator(loopback: bool) -> GatewaySimulator {
        GatewaySimulator::new(
            RegisterMap {
                write_address: 1999,
                read_address: 1099,
            },
            loopback,
        )
    }

    #[tokio::test]
    async fn test_loopback_write_is_visible_in_read_block() {
        let sim = simulator(true);
        let words: Vec<u16> = (0..WORD_COUNT as u16).collect();
        let res = sim
            .call(Request::WriteMultipleRegisters(1999, words.clone().into()))
            .await;
        assert!(res.is_ok());
        assert_eq!(sim.read_block().unwrap().to_vec(), words);
        assert_eq!(sim.written_block().unwrap().to_vec(), words);
    }

    #[tokio::test]
    async fn test_without_loopback_read_block_is_untouched() {
        let sim = simulator(false);
        let res = sim
            .call(Request::WriteMultipleRegisters(1999, vec![7; WORD_COUNT].into()))
            .await;
        assert!(res.is_ok());
        assert_eq!(sim.read_block(), Some(WordBlock::default()));
    }

    #[tokio::test]
    async fn test_out_of_block_write_changes_nothing() {
        let sim = simulator(false);
        // Last register of the block plus one outside of it
        let res = sim
            .call(Request::WriteMultipleRegisters(1999 + 24, vec![1, 1].into()))
            .await;
        assert_eq!(res.err(), Some(ExceptionCode::IllegalDataAddress));
        assert_eq!(sim.written_block(), Some(WordBlock::default()));
    }

    #[tokio::test]
    async fn test_unsupported_function() {
        let sim = simulator(false);
        let res = sim.call(Request::ReadCoils(0, 1)).await;
        assert_eq!(res.err(), Some(ExceptionCode::IllegalFunction));
    }
}
