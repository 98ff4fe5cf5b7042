//! mudswarm — a multi-session load generator and autonomous player for
//! DikuMUD/ROM-lineage servers.
//!
//! One process drives N telnet sessions. Each session negotiates the MUD
//! option set (MSDP, GMCP, NAWS, TTYPE, EOR, SGA, ECHO), walks a login /
//! character-creation state machine, mirrors live character and room state
//! out of MSDP and the server's structured `[BOT:…]` lines, and hands
//! control to a priority-preemptive behavior engine that plays the game:
//! fight, loot, heal, flee, navigate, train, shop. A coordinator staggers
//! the sessions in, watches them, and aggregates throughput, latency, and
//! game-event metrics.
//!
//! Layering, bottom up:
//!
//! | module | role |
//! |--------|------|
//! | [`telnet`] | byte-stream IAC parser + option negotiation |
//! | [`net`] | TCP/TLS connection, pure protocol decode stage |
//! | [`msdp`] | MSDP value tree, typed character/room mirrors, GMCP |
//! | [`text`] | prompts, exits, combat lines, structured BOT records |
//! | [`session`] | login state machine, throttle, per-chunk fan-in |
//! | [`rooms`] | static vnums and navigation routes |
//! | [`behavior`] | the engine and the behavior library |
//! | [`metrics`] | per-session counters, locked aggregation, reports |
//! | [`coordinator`] | accounts, staggered spawn, workers, shutdown |
//! | [`cli`] | the command-line surface |

pub mod behavior;
pub mod cli;
pub mod coordinator;
pub mod metrics;
pub mod msdp;
pub mod net;
pub mod rooms;
pub mod session;
pub mod telnet;
pub mod text;
