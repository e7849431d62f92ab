mod progress;
mod pull;
mod push;
