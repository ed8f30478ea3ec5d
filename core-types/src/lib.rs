// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared configuration and health/status types for the raffle services.

pub mod config;
pub mod status;
