//! Detection to action pipeline: the detection loop picks a target and
//! queues an [`AimAction`] through the cooldown gate; the aim loop drains the
//! queue and drives the injector.

pub mod aim;
pub mod cooldown;
pub mod detection;
pub mod handoff;
pub mod weapon;

pub use aim::{AimWorker, aim_point};
pub use cooldown::CooldownGate;
pub use detection::DetectionWorker;
pub use handoff::{AimAction, TargetReceiver, TargetSender, target_channel};
pub use weapon::WeaponWorker;
