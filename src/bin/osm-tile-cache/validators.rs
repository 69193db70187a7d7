use std::{str::FromStr, time::Duration};

use osm_tile_cache::{MAX_LATITUDE, MAX_ZOOM};

pub(crate) fn latitude(v: &str) -> Result<f64, String> {
    let val = v.parse::<f64>().map_err(|_| "must be numeric".to_owned())?;

    if val.abs() >= MAX_LATITUDE {
        return Err(format!("must be within ±{}°", MAX_LATITUDE));
    }

    Ok(val)
}

pub(crate) fn longitude(v: &str) -> Result<f64, String> {
    let val = v.parse::<f64>().map_err(|_| "must be numeric".to_owned())?;

    if val < -180f64 {
        return Err("must be >= -180°".to_owned());
    } else if val > 180f64 {
        return Err("must be <= 180°".to_owned());
    }

    Ok(val)
}

pub(crate) fn zoom(v: &str) -> Result<u8, String> {
    let val = v.parse::<u8>().map_err(|_| "must be numeric".to_owned())?;
    if val <= MAX_ZOOM {
        Ok(val)
    } else {
        Err(format!("must be <= {}", MAX_ZOOM))
    }
}

pub(crate) fn positive<T: FromStr + PartialOrd + Default>(v: &str) -> Result<T, String> {
    let val = v.parse::<T>().map_err(|_| "must be numeric".to_owned())?;
    if val > T::default() {
        Ok(val)
    } else {
        Err("must be > 0".to_owned())
    }
}

pub(crate) fn millis(v: &str) -> Result<Duration, String> {
    v.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| "must be a whole number of milliseconds".to_owned())
}

/// Parses `ZOOM=MILLIS`, e.g. `19=60`.
pub(crate) fn zoom_delay(v: &str) -> Result<(u8, Duration), String> {
    let (z, ms) = v
        .split_once('=')
        .ok_or_else(|| "expected ZOOM=MILLIS".to_owned())?;

    Ok((zoom(z.trim())?, millis(ms.trim())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates() {
        assert_eq!(latitude("30.75"), Ok(30.75));
        assert!(latitude("85.06").is_err());
        assert!(latitude("north").is_err());
        assert_eq!(longitude("-180"), Ok(-180.0));
        assert!(longitude("180.5").is_err());
    }

    #[test]
    fn zoom_delays() {
        assert_eq!(zoom_delay("19=60"), Ok((19, Duration::from_millis(60))));
        assert!(zoom_delay("19").is_err());
        assert!(zoom_delay("23=60").is_err());
        assert_eq!(positive::<u64>("0"), Err("must be > 0".to_owned()));
    }
}
