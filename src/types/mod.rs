/*
    Copyright © 2026, the cosipbft_rs authors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types common across the subprotocols of the ordering service.

pub mod basic;

pub mod block;

pub mod certificate;

pub mod roster;
