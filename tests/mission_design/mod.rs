mod bootstrap;
mod config;
