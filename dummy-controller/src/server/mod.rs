// Real servers
//
// These have their own (ingress) socket.
pub mod controller;

// Background tasks
//
// These have no socket but run for the lifetime of the process.
pub mod lifecycle;
