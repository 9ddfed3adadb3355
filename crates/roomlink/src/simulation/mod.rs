mod tick;

pub use tick::TickLoop;
