mod listener;

pub use listener::ChangeListener;
