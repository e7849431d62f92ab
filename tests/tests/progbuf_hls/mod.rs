mod backpressure;
