mod health_check;
mod helpers;
mod login;
mod logout;
mod permissions;
mod persistence;
mod scenarios;
