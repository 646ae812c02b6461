//! Running game of one room and its tick loop

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::sync::Authority;
use crate::util::time::Scheduler;
use crate::ws::connection::{Connection, ConnectionId};
use crate::ws::protocol::{ClientSync, ServerMessage};

/// Work queued into a running game
#[derive(Debug)]
pub enum RoomCommand {
    Sync {
        connection: ConnectionId,
        sync: ClientSync,
    },
    Leave {
        connection: ConnectionId,
    },
    Stop,
}

/// Lobby-side handle; the game is over once its task drops the receiver
#[derive(Clone)]
pub struct RoomHandle {
    commands: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    pub fn sender(&self) -> mpsc::UnboundedSender<RoomCommand> {
        self.commands.clone()
    }

    pub fn leave(&self, connection: ConnectionId) {
        let _ = self.commands.send(RoomCommand::Leave { connection });
    }

    pub fn stop(&self) {
        let _ = self.commands.send(RoomCommand::Stop);
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

/// The authoritative loop for one room
pub struct RoomGame {
    room_id: u32,
    authority: Authority,
    members: HashMap<ConnectionId, Connection>,
    scheduler: Scheduler,
    commands: mpsc::UnboundedReceiver<RoomCommand>,
}

impl RoomGame {
    /// Members start listening right away, so sync frames sent before the
    /// task is first polled are queued, not lost.
    pub fn new(
        room_id: u32,
        authority: Authority,
        members: Vec<Connection>,
        scheduler: Scheduler,
    ) -> (Self, RoomHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        for member in &members {
            member.listen_sync(tx.clone());
        }

        let game = Self {
            room_id,
            authority,
            members: members.into_iter().map(|c| (c.id(), c)).collect(),
            scheduler,
            commands: rx,
        };
        (game, RoomHandle { commands: tx })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Run until every member has left or the room is stopped
    pub async fn run(mut self) {
        info!(room_id = self.room_id, players = self.members.len(), "Game started");

        let mut ticker = interval(self.scheduler.period());
        // Burst keeps simulated time in step with wall time after a stall
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.on_tick(),
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle(command) {
                        break;
                    }
                }
            }
        }

        self.shutdown();
    }

    /// Returns false when the loop should end
    pub fn handle(&mut self, command: RoomCommand) -> bool {
        match command {
            RoomCommand::Sync { connection, sync } => {
                self.authority.receive(connection, sync);
                true
            }
            RoomCommand::Leave { connection } => {
                self.authority.disconnect(connection);
                if let Some(member) = self.members.remove(&connection) {
                    member.unlisten_sync();
                }
                if self.members.is_empty() {
                    info!(room_id = self.room_id, "All players left, ending game");
                    return false;
                }
                true
            }
            RoomCommand::Stop => false,
        }
    }

    /// One scheduler step: buffer the clock, broadcast when due
    pub fn on_tick(&mut self) {
        let tick = self.scheduler.advance();
        if let Some(dt) = tick.simulate_dt {
            self.authority.simulate(dt);
        }
        if !tick.broadcast {
            return;
        }

        for (connection, sync) in self.authority.flush() {
            let Some(member) = self.members.get(&connection) else {
                continue;
            };
            if !member.send(&ServerMessage::ServerSync(sync)) {
                debug!(room_id = self.room_id, connection, "Sync to closed connection");
            }
        }
    }

    fn shutdown(&mut self) {
        for member in self.members.values() {
            member.unlisten_sync();
        }
        self.commands.close();
        info!(
            room_id = self.room_id,
            ticks = self.scheduler.tick(),
            "Game stopped"
        );
    }
}
