//! Headless bot - logs in, hosts a game and wanders around shooting
//!
//! Exercises the whole client pipeline: codec, session, prediction and
//! reconciliation. Configure with `SERVER_URL` and `BOT_NICKNAME`.

use std::env;
use std::f64::consts::TAU;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::interval;
use tracing::{debug, info, trace};

use pixel_arena::client::{run_with_reconnect, Backoff, ClientError, ClientSession};
use pixel_arena::game::{EventBus, Fixed, Input, StateEvent, StateEventKind, Vec2, WorldState};
use pixel_arena::sync::{Prediction, RenderSink};
use pixel_arena::util::logging::init_tracing;
use pixel_arena::ws::protocol::ServerMessage;

const INPUT_PERIOD: Duration = Duration::from_millis(100);
const TURN_CHANCE: f64 = 0.1;
const SHOOT_CHANCE: f64 = 0.25;

/// Logs the bot's own actor every few frames
struct LogSink {
    me: u32,
    frames: u64,
}

impl RenderSink for LogSink {
    fn render(&mut self, snapshot: &WorldState) {
        self.frames += 1;
        if self.frames % 40 != 0 {
            return;
        }
        if let Some(actor) = snapshot.actors.get(&self.me) {
            info!(
                hp = actor.hp,
                damage = actor.damage,
                x = %actor.position.x,
                y = %actor.position.y,
                bullets = snapshot.bullets.len(),
                "Status"
            );
        }
    }
}

fn random_heading(rng: &mut StdRng) -> Vec2 {
    let angle = rng.gen::<f64>() * TAU;
    Vec2::round_f64(angle.cos(), angle.sin())
}

async fn play(mut session: ClientSession) -> Result<(), ClientError> {
    let me = session.player().id;
    let start = session.host_game().await?;
    info!(room_id = start.room.id, actors = start.state.actors.len(), "Game started");

    let events = EventBus::new();
    events.subscribe(StateEventKind::DamageBorn, move |event| {
        if let StateEvent::DamageBorn {
            actor_id,
            source_id,
            damage,
            critical,
        } = *event
        {
            if source_id == me {
                debug!(target_id = actor_id, damage, critical, "Hit");
            }
        }
    });

    let mut prediction = Prediction::new(events);
    prediction.load(&start.state);

    let mut sink = LogSink { me, frames: 0 };
    let mut rng = StdRng::from_entropy();
    let mut heading = random_heading(&mut rng);
    let mut ticker = interval(INPUT_PERIOD);
    let step = Fixed::from_raw(INPUT_PERIOD.as_millis() as i32);

    loop {
        tokio::select! {
            msg = session.recv() => match msg? {
                ServerMessage::ServerSync(sync) => {
                    prediction.reconcile(&sync);
                    prediction.render(&mut sink);
                }
                other => trace!(tag = ?other.tag(), "Ignored push"),
            },
            _ = ticker.tick() => {
                if rng.gen_bool(TURN_CHANCE) {
                    heading = random_heading(&mut rng);
                }
                let sync = prediction.issue(Input::ActorMove {
                    actor_id: me,
                    direction: heading,
                    dt: step,
                });
                session.send_sync(sync).await?;

                let muzzle = prediction
                    .predicted()
                    .actor(me)
                    .filter(|actor| actor.is_alive())
                    .map(|actor| actor.position);
                if let Some(position) = muzzle.filter(|_| rng.gen_bool(SHOOT_CHANCE)) {
                    let sync = prediction.issue(Input::WeaponShoot {
                        owner_id: me,
                        position,
                        direction: heading,
                    });
                    session.send_sync(sync).await?;
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(&env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

    let url = env::var("SERVER_URL").unwrap_or_else(|_| "ws://127.0.0.1:8080/ws".to_string());
    let nickname = env::var("BOT_NICKNAME")
        .unwrap_or_else(|_| format!("bot{}", rand::random::<u16>()));

    info!(%url, %nickname, "Starting bot");

    let mut backoff = Backoff::default();
    tokio::select! {
        _ = run_with_reconnect(&url, &nickname, &mut backoff, play) => {}
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, stopping bot"),
    }
    Ok(())
}
